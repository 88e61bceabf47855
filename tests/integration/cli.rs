//! Command line tests for the simple-llm binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_SCHEMA: &str = r#"{
    "countries": {
        "type": "array",
        "definition": "Return an array of ISO Alpha-3 country codes.",
        "example": "[`ARG`, `IND`, `MEX`]",
        "parallelKey": "places"
    },
    "sentiment": {
        "definition": "positive, negative or neutral",
        "example": "neutral",
        "parallelKey": "tone"
    }
}"#;

/// Get a Command instance for the simple-llm binary
#[allow(deprecated)]
fn simple_llm_cmd() -> Command {
    let mut cmd = Command::cargo_bin("simple-llm").expect("Failed to find simple-llm binary");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_files(dir: &TempDir) {
    fs::write(dir.path().join("schema.json"), TEST_SCHEMA).unwrap();
    fs::write(
        dir.path().join("input.txt"),
        "Originally born in New Jersey and also lived in Bangalore.",
    )
    .unwrap();
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_run_command_help_shows_executor_options() {
    simple_llm_cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--deadline-ms"))
        .stdout(predicate::str::contains("--max-checkpoints"));
}

#[test]
fn test_prompts_command_single_prompt() {
    let dir = TempDir::new().unwrap();
    write_files(&dir);

    let output = simple_llm_cmd()
        .current_dir(dir.path())
        .args(["prompts", "--task", "Extract the countries."])
        .args(["--schema", "schema.json", "--input", "input.txt"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let prompts = stdout_json(&output);
    let prompts = prompts.as_array().unwrap();
    assert_eq!(prompts.len(), 1);
    let prompt = prompts[0].as_str().unwrap();
    assert!(prompt.contains("Extract the countries."));
    assert!(prompt.contains("countries, sentiment"));
    assert!(prompt.contains("New Jersey"));
}

#[test]
fn test_prompts_command_split() {
    let dir = TempDir::new().unwrap();
    write_files(&dir);

    let output = simple_llm_cmd()
        .current_dir(dir.path())
        .args(["prompts", "--task", "Analyze.", "--split"])
        .args(["--schema", "schema.json", "--input", "input.txt"])
        .args(["--law", "Law 8: Answer in English."])
        .output()
        .unwrap();

    assert!(output.status.success());
    let prompts = stdout_json(&output);
    let prompts = prompts.as_array().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts
        .iter()
        .all(|p| p.as_str().unwrap().contains("Law 8: Answer in English.")));
}

#[test]
fn test_zero_concurrency_fails_before_any_request() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("prompts.json"), r#"["one", "two"]"#).unwrap();

    simple_llm_cmd()
        .current_dir(dir.path())
        .env("SIMPLE_LLM_PROVIDER__ENDPOINT", "http://127.0.0.1:9")
        .args(["run", "--prompts", "prompts.json", "--concurrency", "0"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("concurrency must be at least 1"));
}

#[test]
fn test_invalid_settings_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("settings.toml"), "[executor]\ndeadline_ms = 0\n").unwrap();
    fs::write(dir.path().join("prompts.json"), r#"["one"]"#).unwrap();

    simple_llm_cmd()
        .current_dir(dir.path())
        .args(["--config", "settings.toml", "run", "--prompts", "prompts.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("deadline must be greater than zero"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_command_against_mock_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"answer\": 42}"}}]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("prompts.json"), r#"["one", "two"]"#).unwrap();

    let output = simple_llm_cmd()
        .current_dir(dir.path())
        .env("SIMPLE_LLM_PROVIDER__ENDPOINT", server.uri())
        .env("SIMPLE_LLM_PROVIDER__API_KEY", "test-key")
        .args(["run", "--prompts", "prompts.json", "--mode", "series"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let outcomes = stdout_json(&output);
    let outcomes = outcomes.as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    for outcome in outcomes {
        assert_eq!(outcome["status"], "fulfilled");
        assert_eq!(outcome["value"]["response"], json!({"answer": 42}));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_command_line_overrides_invalid_settings_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"answer\": 1}"}}]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("settings.toml"), "[executor]\nconcurrency = 0\n").unwrap();
    fs::write(dir.path().join("prompts.json"), r#"["one"]"#).unwrap();

    let output = simple_llm_cmd()
        .current_dir(dir.path())
        .env("SIMPLE_LLM_PROVIDER__ENDPOINT", server.uri())
        .args([
            "--config",
            "settings.toml",
            "run",
            "--prompts",
            "prompts.json",
            "--concurrency",
            "2",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let outcomes = stdout_json(&output);
    assert_eq!(outcomes[0]["status"], "fulfilled");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_command_combine_fails_open() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"ok\": true}"}}]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("prompts.json"), r#"["one", "two"]"#).unwrap();

    let output = simple_llm_cmd()
        .current_dir(dir.path())
        .env("SIMPLE_LLM_PROVIDER__ENDPOINT", server.uri())
        .args(["run", "--prompts", "prompts.json", "--mode", "series", "--combine"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let combined = stdout_json(&output);
    assert_eq!(combined["response"], json!({"ok": true}));
    assert_eq!(combined["analytics"].as_object().unwrap().len(), 1);
    assert!(combined["analytics"]["1"].is_object());
}
