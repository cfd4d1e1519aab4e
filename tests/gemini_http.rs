//! Gemini backend against a local HTTP stub.
//!
//! The stub answers each connection with the next canned response and
//! records the request line, headers and body it received. Responses carry
//! `Connection: close` so every call opens a fresh connection.

use exam_extract::backend::GeminiBackend;
use exam_extract::{
    extract_documents, DocumentSource, ExtractError, ExtractedDocument, ExtractionConfig, FailureKind,
    ModelBackend, SelectionSet,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Stub {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

async fn serve(responses: Vec<(u16, &'static str)>) -> Stub {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    tokio::spawn(async move {
        for (status, body) in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let request = read_request(&mut socket).await;
            seen.lock().unwrap().push(request);
            let reply = format!(
                "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.ok();
            socket.shutdown().await.ok();
        }
    });

    Stub { base, requests }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let length = text[..header_end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn config(base: &str) -> ExtractionConfig {
    ExtractionConfig::builder()
        .api_key("AIza-stub-key")
        .api_base(base)
        .models(["gemini-2.5-flash", "gemini-2.5-pro"])
        .retry_delay(Duration::from_millis(10))
        .request_timeout_secs(5)
        .build()
        .unwrap()
}

const OK_BODY: &str = r#"{
  "candidates": [{"content": {"role": "model", "parts": [{"text": "<h2>글의 목적</h2>"}, {"text": "<div class=\"question-item\">18.</div>"}]}}],
  "usageMetadata": {"promptTokenCount": 812, "candidatesTokenCount": 64}
}"#;

const QUOTA_BODY: &str = r#"{"error": {"code": 429, "message": "Resource has been exhausted (e.g. check quota).", "status": "RESOURCE_EXHAUSTED"}}"#;

const NOT_FOUND_BODY: &str = r#"{"error": {"code": 404, "message": "models/gemini-9 is not found for API version v1beta", "status": "NOT_FOUND"}}"#;

const BAD_KEY_BODY: &str = r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT", "details": [{"@type": "type.googleapis.com/google.rpc.ErrorInfo", "reason": "API_KEY_INVALID"}]}}"#;

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_call_joins_parts_and_reads_usage() {
    let stub = serve(vec![(200, OK_BODY)]).await;
    let backend = GeminiBackend::new("AIza-stub-key", &config(&stub.base)).unwrap();

    let generation = backend
        .generate("gemini-2.5-flash", "prompt text")
        .await
        .unwrap();

    assert_eq!(
        generation.text,
        "<h2>글의 목적</h2><div class=\"question-item\">18.</div>"
    );
    assert_eq!(generation.input_tokens, 812);
    assert_eq!(generation.output_tokens, 64);

    let requests = stub.requests.lock().unwrap();
    let request = &requests[0];
    assert!(request.starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent"));
    assert!(request.to_lowercase().contains("x-goog-api-key: aiza-stub-key"));
    assert!(request.contains("\"generationConfig\""));
    assert!(request.contains("prompt text"));
}

#[tokio::test]
async fn status_codes_are_classified_at_the_source() {
    let stub = serve(vec![(429, QUOTA_BODY), (404, NOT_FOUND_BODY), (400, BAD_KEY_BODY)]).await;
    let backend = GeminiBackend::new("AIza-stub-key", &config(&stub.base)).unwrap();

    let quota = backend.generate("gemini-2.5-flash", "p").await.unwrap_err();
    assert_eq!(quota.kind, FailureKind::RateLimited);

    let missing = backend.generate("gemini-9", "p").await.unwrap_err();
    assert_eq!(missing.kind, FailureKind::ModelNotFound);

    let bad_key = backend.generate("gemini-2.5-flash", "p").await.unwrap_err();
    assert_eq!(bad_key.kind, FailureKind::Permission);
}

#[tokio::test]
async fn unreachable_server_is_unavailable() {
    // Bind and drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let backend = GeminiBackend::new("AIza-stub-key", &config(&base)).unwrap();
    let err = backend.generate("gemini-2.5-flash", "p").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Unavailable);
}

#[tokio::test]
async fn pipeline_falls_back_over_http() {
    let stub = serve(vec![(404, NOT_FOUND_BODY), (200, OK_BODY)]).await;
    let docs: Vec<DocumentSource> = vec![ExtractedDocument::new("exam.pdf", vec!["18. 다음 글의 목적으로".into()]).into()];

    let output = extract_documents(&docs, &SelectionSet::all(), &config(&stub.base))
        .await
        .unwrap();

    assert_eq!(output.model, "gemini-2.5-pro");
    assert!(output.html.starts_with("<h2>글의 목적</h2>"));
    let requests = stub.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].contains("gemini-2.5-pro:generateContent"));
}

#[tokio::test]
async fn rejected_key_stops_over_http() {
    let stub = serve(vec![(400, BAD_KEY_BODY), (200, OK_BODY)]).await;
    let docs: Vec<DocumentSource> = vec![ExtractedDocument::new("exam.pdf", vec!["18.".into()]).into()];

    let err = extract_documents(&docs, &SelectionSet::all(), &config(&stub.base))
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::Permission { .. }));
    assert_eq!(stub.requests.lock().unwrap().len(), 1);
}
