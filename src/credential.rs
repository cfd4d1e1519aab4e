//! Local persistence of the Gemini API key.
//!
//! A small JSON key-value file under the platform config directory holds one
//! secret under a fixed key. Explicit configuration (flag or environment)
//! always wins over the stored value; the store is only the fallback.

use crate::config::mask_secret;
use crate::error::ExtractError;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key under which the secret is stored.
pub const CREDENTIAL_KEY: &str = "gemini_api_key";

const APP_DIR: &str = "exam-extract";
const FILE_NAME: &str = "credentials.json";

/// A JSON key-value file holding the API key.
#[derive(Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stored = self.load().ok().flatten();
        f.debug_struct("CredentialStore")
            .field("path", &self.path)
            .field("secret", &stored.as_deref().map(mask_secret))
            .finish()
    }
}

impl CredentialStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/exam-extract/credentials.json`.
    pub fn default_location() -> Result<Self, ExtractError> {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .ok_or_else(|| ExtractError::CredentialStore {
                path: PathBuf::from(FILE_NAME),
                detail: "no config or home directory".into(),
            })?;
        Ok(Self::open(base.join(APP_DIR).join(FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored secret, or `None` when nothing (or a blank value) is saved.
    pub fn load(&self) -> Result<Option<String>, ExtractError> {
        let map = self.read_map()?;
        Ok(map
            .get(CREDENTIAL_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string))
    }

    /// Persist `secret`, keeping any other keys in the file.
    pub fn save(&self, secret: &str) -> Result<(), ExtractError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(ExtractError::MissingCredential);
        }
        let mut map = self.read_map()?;
        map.insert(CREDENTIAL_KEY.to_string(), Value::String(secret.to_string()));
        self.write_map(&map)?;
        debug!("Saved credential {} to {}", mask_secret(secret), self.path.display());
        Ok(())
    }

    /// Remove the stored secret. Returns whether one was present.
    pub fn clear(&self) -> Result<bool, ExtractError> {
        let mut map = self.read_map()?;
        let removed = map.remove(CREDENTIAL_KEY).is_some();
        if removed {
            self.write_map(&map)?;
        }
        Ok(removed)
    }

    fn read_map(&self) -> Result<Map<String, Value>, ExtractError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.error(e)),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw).map_err(|e| self.error(e))? {
            Value::Object(map) => Ok(map),
            _ => Err(self.error("expected a JSON object")),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), ExtractError> {
        let json = serde_json::to_vec_pretty(map).map_err(|e| self.error(e))?;
        crate::export::write_export(&self.path, &json).map_err(|e| self.error(e))?;
        restrict_permissions(&self.path).map_err(|e| self.error(e))
    }

    fn error(&self, detail: impl fmt::Display) -> ExtractError {
        ExtractError::CredentialStore {
            path: self.path.clone(),
            detail: detail.to_string(),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("nested").join(FILE_NAME));
        (dir, store)
    }

    #[test]
    fn missing_file_loads_nothing() {
        let (_dir, store) = store();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn save_load_clear() {
        let (_dir, store) = store();
        store.save("  AIzaSyExample  ").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("AIzaSyExample"));
        assert!(store.clear().unwrap());
        assert_eq!(store.load().unwrap(), None);
        assert!(!store.clear().unwrap());
    }

    #[test]
    fn other_keys_survive_save() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), r#"{"theme":"dark"}"#).unwrap();
        store.save("AIzaSyExample").unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw[CREDENTIAL_KEY], "AIzaSyExample");
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.load(), Err(ExtractError::CredentialStore { .. })));
    }

    #[test]
    fn blank_secret_is_rejected() {
        let (_dir, store) = store();
        assert!(matches!(store.save("   "), Err(ExtractError::MissingCredential)));
    }

    #[test]
    fn debug_masks_secret() {
        let (_dir, store) = store();
        store.save("AIzaSyVerySecret").unwrap();
        let dbg = format!("{store:?}");
        assert!(dbg.contains("AIza…"));
        assert!(!dbg.contains("VerySecret"));
    }
}
