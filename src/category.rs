//! Question-type catalogue and the user's selection over it.
//!
//! The catalogue is the fixed set of CSAT English reading types (items
//! 18–45). Listening items are never part of it. Keyword hints are the
//! phrases that appear in each type's question stem and are used only to
//! build prompt text.

use crate::error::ExtractError;
use serde::Serialize;
use std::collections::BTreeSet;

/// One extractable question type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: &'static str,
    pub label: &'static str,
    pub keywords: &'static str,
}

/// Every category, in display and prompt order.
pub const CATEGORIES: &[Category] = &[
    Category { id: "purpose", label: "글의 목적", keywords: "목적으로 가장 적절한 것" },
    Category { id: "mood", label: "심경/분위기", keywords: "심경 변화, 심경, 분위기" },
    Category { id: "claim", label: "필자의 주장", keywords: "필자가 주장하는 바로" },
    Category { id: "implication", label: "함축 의미", keywords: "밑줄 친 부분이 의미하는 바로" },
    Category { id: "main_idea", label: "글의 요지", keywords: "요지로 가장 적절한 것" },
    Category { id: "topic", label: "글의 주제", keywords: "주제로 가장 적절한 것" },
    Category { id: "title", label: "글의 제목", keywords: "제목으로 가장 적절한 것" },
    Category { id: "grammar", label: "어법", keywords: "어법상 틀린 것, 어법상 적절한 것" },
    Category { id: "vocab", label: "어휘", keywords: "낱말의 쓰임, 문맥상 적절하지 않은" },
    Category { id: "blank", label: "빈칸 추론", keywords: "빈칸에 들어갈 말" },
    Category { id: "unrelated", label: "흐름 무관 문장", keywords: "흐름과 관계 없는 문장" },
    Category { id: "order", label: "글의 순서", keywords: "이어질 글의 순서" },
    Category { id: "insertion", label: "문장 삽입", keywords: "들어 가기에 가장 적절한 곳" },
    Category { id: "summary", label: "요약문 완성", keywords: "요약하고자 한다" },
    Category { id: "long_passage", label: "장문 독해", keywords: "물음에 답하시오 (장문)" },
];

/// Look up a category by id.
pub fn find(id: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.id == id)
}

/// The set of category ids the user wants extracted.
///
/// Only catalogue ids can be inserted, so `len() == CATEGORIES.len()`
/// means "everything selected".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionSet {
    ids: BTreeSet<&'static str>,
}

impl Default for SelectionSet {
    /// Everything selected.
    fn default() -> Self {
        Self::all()
    }
}

impl SelectionSet {
    pub fn all() -> Self {
        Self {
            ids: CATEGORIES.iter().map(|c| c.id).collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            ids: BTreeSet::new(),
        }
    }

    /// Parse a comma-separated id list such as `"purpose,blank"`.
    ///
    /// `"all"` selects every category. Blank entries are ignored.
    pub fn parse(list: &str) -> Result<Self, ExtractError> {
        if list.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }
        let mut set = Self::empty();
        for id in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            set.insert(id)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, id: &str) -> Result<(), ExtractError> {
        let category = find(id).ok_or_else(|| ExtractError::InvalidCategory { id: id.to_string() })?;
        self.ids.insert(category.id);
        Ok(())
    }

    /// Flip one category. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> Result<bool, ExtractError> {
        let category = find(id).ok_or_else(|| ExtractError::InvalidCategory { id: id.to_string() })?;
        if self.ids.remove(category.id) {
            Ok(false)
        } else {
            self.ids.insert(category.id);
            Ok(true)
        }
    }

    /// Clear when everything is selected, otherwise select everything.
    pub fn toggle_all(&mut self) {
        if self.is_full() {
            self.ids.clear();
        } else {
            *self = Self::all();
        }
    }

    pub fn select_all(&mut self) {
        *self = Self::all();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ids.len() == CATEGORIES.len()
    }

    /// Selected categories in catalogue order.
    pub fn selected(&self) -> Vec<&'static Category> {
        CATEGORIES.iter().filter(|c| self.ids.contains(c.id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_ids_are_unique() {
        let ids: BTreeSet<_> = CATEGORIES.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), CATEGORIES.len());
        assert_eq!(CATEGORIES.len(), 15);
    }

    #[test]
    fn paired_toggle_restores_selection() {
        let mut set = SelectionSet::parse("purpose,blank").unwrap();
        let before = set.clone();
        assert!(set.toggle("order").unwrap());
        assert!(!set.toggle("order").unwrap());
        assert_eq!(set, before);

        assert!(!set.toggle("blank").unwrap());
        assert!(set.toggle("blank").unwrap());
        assert_eq!(set, before);
    }

    #[test]
    fn toggle_all_full_and_empty() {
        let mut set = SelectionSet::all();
        set.toggle_all();
        assert!(set.is_empty());
        set.toggle_all();
        assert!(set.is_full());
    }

    #[test]
    fn toggle_all_on_partial_selects_everything() {
        let mut set = SelectionSet::parse("grammar").unwrap();
        set.toggle_all();
        assert!(set.is_full());
    }

    #[test]
    fn selected_follows_catalogue_order() {
        let set = SelectionSet::parse("summary, purpose ,blank").unwrap();
        let ids: Vec<_> = set.selected().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["purpose", "blank", "summary"]);
    }

    #[test]
    fn unknown_id_is_rejected() {
        let err = SelectionSet::parse("purpose,listening").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidCategory { ref id } if id == "listening"));
        assert!(SelectionSet::empty().toggle("nope").is_err());
    }

    #[test]
    fn parse_all_keyword() {
        assert!(SelectionSet::parse("ALL").unwrap().is_full());
        assert!(SelectionSet::parse("").unwrap().is_empty());
    }
}
