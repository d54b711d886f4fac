//! HTTP contract tests for the Gemini backend, against a wiremock server.

use std::time::Duration;

use bugscope_core::{
    AnalysisProvider, Bug, BugStatus, ConsoleLevel, ConsoleLogEntry, Error, Severity,
    TelemetryLog, Viewport,
};
use bugscope_inference::{GeminiBackend, GeminiConfig};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-test";
const ENDPOINT: &str = "/v1beta/models/gemini-test:generateContent";

fn bug() -> Bug {
    Bug {
        id: Uuid::now_v7(),
        project_id: Uuid::now_v7(),
        title: "Checkout button does nothing".to_string(),
        steps: "Add item, click checkout".to_string(),
        expected: "Payment page opens".to_string(),
        actual: "Nothing happens".to_string(),
        severity: Severity::High,
        url: "https://shop.example.com/checkout".to_string(),
        user_agent: "Mozilla/5.0".to_string(),
        viewport: Viewport {
            width: 1280,
            height: 720,
        },
        console_logs: vec![ConsoleLogEntry {
            level: ConsoleLevel::Error,
            message: "TypeError: form is null".to_string(),
            timestamp: 1,
        }]
        .into(),
        network_errors: TelemetryLog::new(),
        screenshot_data_url: None,
        status: BugStatus::Analyzing,
        ai_analysis: None,
        ai_patch_diff: None,
        confidence: None,
        ai_provider: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn backend(server: &MockServer) -> GeminiBackend {
    let config = GeminiConfig::new("test-key")
        .with_base_url(format!("{}/v1beta", server.uri()))
        .with_model(MODEL)
        .with_timeout_seconds(5);
    GeminiBackend::new(config).unwrap()
}

fn candidate(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test]
async fn test_analyze_parses_json_reply() {
    let server = MockServer::start().await;
    let reply = json!({
        "analysis": "The checkout form is looked up before it is rendered.",
        "diff": "--- a/src/Checkout.tsx\n+++ b/src/Checkout.tsx\n@@ -1 +1 @@\n-a\n+b\n",
        "confidence": 0.78
    })
    .to_string();

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(&reply)))
        .expect(1)
        .mount(&server)
        .await;

    let analysis = backend(&server)
        .analyze(&bug(), &["src/Checkout.tsx".to_string()])
        .await
        .unwrap();

    assert_eq!(
        analysis.analysis,
        "The checkout form is looked up before it is rendered."
    );
    assert!(analysis.diff.starts_with("--- a/src/Checkout.tsx"));
    assert_eq!(analysis.confidence, 0.78);
    assert_eq!(analysis.provider, "gemini");
}

#[tokio::test]
async fn test_prompt_carries_bug_and_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(candidate(r#"{"analysis": "ok"}"#)),
        )
        .mount(&server)
        .await;

    backend(&server)
        .analyze(&bug(), &["src/Checkout.tsx".to_string()])
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("Checkout button does nothing"));
    assert!(prompt.contains("TypeError: form is null"));
    assert!(prompt.contains("src/Checkout.tsx"));
}

#[tokio::test]
async fn test_non_json_reply_degrades() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(candidate("The form ref is null on first render.")),
        )
        .mount(&server)
        .await;

    let analysis = backend(&server).analyze(&bug(), &[]).await.unwrap();
    assert_eq!(analysis.analysis, "The form ref is null on first render.");
    assert_eq!(analysis.diff, "NONE");
    assert_eq!(analysis.confidence, 0.5);
}

#[tokio::test]
async fn test_unexpected_body_shape_degrades() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain text body"))
        .mount(&server)
        .await;

    let analysis = backend(&server).analyze(&bug(), &[]).await.unwrap();
    assert_eq!(analysis.analysis, "plain text body");
    assert_eq!(analysis.diff, "NONE");
}

#[tokio::test]
async fn test_no_candidates_uses_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"promptFeedback": {"blockReason": "SAFETY"}})),
        )
        .mount(&server)
        .await;

    let analysis = backend(&server).analyze(&bug(), &[]).await.unwrap();
    assert_eq!(
        analysis.analysis,
        bugscope_inference::EMPTY_ANALYSIS_PLACEHOLDER
    );
}

#[tokio::test]
async fn test_quota_error_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
        })))
        .mount(&server)
        .await;

    let err = backend(&server).analyze(&bug(), &[]).await.unwrap_err();
    assert!(matches!(err, Error::Inference(_)));
    assert!(err.to_string().contains("Quota exceeded"));
}

#[tokio::test]
async fn test_auth_error_is_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}
        })))
        .mount(&server)
        .await;

    let err = backend(&server).analyze(&bug(), &[]).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_server_error_without_body_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = backend(&server).analyze(&bug(), &[]).await.unwrap_err();
    assert!(matches!(err, Error::Inference(_)));
}

#[tokio::test]
async fn test_client_timeout_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(candidate(r#"{"analysis": "late"}"#))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = GeminiConfig::new("test-key")
        .with_base_url(format!("{}/v1beta", server.uri()))
        .with_model(MODEL)
        .with_timeout_seconds(1);
    let err = GeminiBackend::new(config)
        .unwrap()
        .analyze(&bug(), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
}
