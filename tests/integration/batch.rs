//! Prompt batches against a mock chat completion service.

use serde_json::{json, Value};
use simple_llm::llm::{combine, run_many, LlmClient, LlmError};
use simple_llm::settings::ProviderSettings;
use simple_llm::ExecutorConfig;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn answer(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
}

async fn client_for(server: &MockServer) -> LlmClient {
    LlmClient::new(ProviderSettings {
        api_key: "test-key".to_string(),
        endpoint: Some(server.uri()),
        ..ProviderSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_run_many_and_combine() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("countries please"))
        .respond_with(answer(r#"{"countries":["CAN","USA","IND"]}}"#))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("tone please"))
        .respond_with(answer(r#"{"tone":"neutral"}"#))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("broken please"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream error"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let prompts = ["countries please", "broken please", "tone please"];

    let outcomes = run_many(&client, &prompts, ExecutorConfig::default())
        .await
        .unwrap();

    assert!(outcomes[0].is_fulfilled());
    assert!(matches!(
        outcomes[1].reason().and_then(|r| r.task_error()),
        Some(LlmError::Status { status: 500, .. })
    ));
    assert!(outcomes[2].is_fulfilled());

    let combined = combine(&outcomes);
    assert_eq!(
        Value::Object(combined.response),
        json!({"countries": ["CAN", "USA", "IND"], "tone": "neutral"})
    );
    assert_eq!(combined.analytics.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
    assert_eq!(combined.analytics[&2].total_tokens, Some(15));
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(answer(r#"{"late":true}"#).set_delay(std::time::Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let config = ExecutorConfig::new()
        .with_deadline_millis(50)
        .with_max_checkpoints(1);

    let outcomes = run_many(&client, &["hello"], config).await.unwrap();

    let timeout = outcomes[0].reason().and_then(|r| r.timeout()).unwrap();
    assert_eq!(timeout.attempts, 2);
}
