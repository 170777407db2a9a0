//! Adapter wire formats against mock HTTP backends.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use toolhost::config::{Credentials, HostSettings};
use toolhost::error::HostError;
use toolhost::provider::anthropic::AnthropicProvider;
use toolhost::provider::azure::AzureOpenAiProvider;
use toolhost::provider::ollama::OllamaProvider;
use toolhost::provider::openai::OpenAiProvider;
use toolhost::provider::{create_provider, ModelProvider, ProviderKind};
use toolhost::tools::{ToolDefinition, ToolInputSchema};
use toolhost::types::*;

fn read_tool() -> ToolDefinition {
    ToolDefinition::new(
        "fs__read",
        "Read a file",
        ToolInputSchema::object().string("path", "File path", true).build(),
    )
}

/// History with one assistant turn that called two tools.
fn history_with_two_results() -> Vec<Message> {
    vec![
        Message::system("You are terse."),
        Message::user("read both"),
        Message::new(
            Role::Assistant,
            vec![
                ContentBlock::text("Reading."),
                ContentBlock::tool_use("t1", "fs__read", json!({"path": "a"})),
                ContentBlock::tool_use("t2", "fs__read", json!({"path": "b"})),
            ],
        ),
        Message::tool_result("t1", json!("A"), "A", false),
        Message::tool_result("t2", json!("B"), "B", true),
    ]
}

async fn last_request_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.expect("recording enabled");
    let last = requests.last().expect("at least one request");
    serde_json::from_slice(&last.body).expect("JSON body")
}

fn anthropic(server: &MockServer) -> AnthropicProvider {
    AnthropicProvider::new(
        "claude-3-5-sonnet-20240620".into(),
        "sk-ant-test".into(),
        Some(server.uri()),
        GenerationSettings::default(),
    )
}

fn openai(server: &MockServer) -> OpenAiProvider {
    OpenAiProvider::new(
        "gpt-4o".into(),
        "sk-test".into(),
        Some(server.uri()),
        GenerationSettings::default(),
    )
}

fn ollama(server: &MockServer) -> OllamaProvider {
    OllamaProvider::new("llama3.2".into(), Some(server.uri()), GenerationSettings::default())
}

// Anthropic

#[tokio::test]
async fn anthropic_decodes_text_and_tool_use() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Let me look."},
                {"type": "tool_use", "id": "toolu_1", "name": "fs__read", "input": {"path": "a"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 34}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let message = anthropic(&server)
        .create_message("what is in a?", &[], &[read_tool()])
        .await
        .unwrap();

    assert_eq!(message.role, Role::Assistant);
    assert_eq!(message.text(), "Let me look.");
    assert_eq!(message.usage, Usage::new(12, 34));
    assert_eq!(message.finish_reason, Some(FinishReason::ToolCalls));
    let calls = message.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id, "toolu_1");
    assert_eq!(calls[0].arguments()["path"], "a");

    let body = last_request_body(&server).await;
    assert_eq!(body["messages"], json!([{"role": "user", "content": [{"type": "text", "text": "what is in a?"}]}]));
    assert_eq!(body["tools"][0]["name"], "fs__read");
    assert_eq!(body["tools"][0]["input_schema"]["required"], json!(["path"]));
    assert_eq!(body["max_tokens"], 4096);
}

#[tokio::test]
async fn anthropic_hoists_system_and_merges_tool_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Both read."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1, "output_tokens": 1}
        })))
        .mount(&server)
        .await;

    anthropic(&server)
        .create_message("", &history_with_two_results(), &[])
        .await
        .unwrap();

    let body = last_request_body(&server).await;
    assert_eq!(body["system"], "You are terse.");
    assert!(body.get("tools").is_none());
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["content"][1]["type"], "tool_use");
    assert_eq!(
        messages[2],
        json!({"role": "user", "content": [
            {"type": "tool_result", "tool_use_id": "t1", "content": "A", "is_error": false},
            {"type": "tool_result", "tool_use_id": "t2", "content": "B", "is_error": true}
        ]})
    );
}

#[tokio::test]
async fn anthropic_overload_maps_to_transient_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_json(json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })))
        .mount(&server)
        .await;

    let err = anthropic(&server).create_message("hi", &[], &[]).await.unwrap_err();
    match &err {
        HostError::Overloaded(message) => assert_eq!(message, "overloaded_error: Overloaded"),
        other => panic!("expected Overloaded, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn anthropic_auth_failure_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&server)
        .await;

    let err = anthropic(&server).create_message("hi", &[], &[]).await.unwrap_err();
    assert!(matches!(err, HostError::Authentication(ref m) if m.contains("invalid x-api-key")));
    assert!(!err.is_transient());
}

// OpenAI

#[tokio::test]
async fn openai_decodes_tool_calls_with_string_arguments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "fs__read", "arguments": "{\"path\":\"b\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 50, "completion_tokens": 7, "total_tokens": 57}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let message = openai(&server)
        .create_message("read b", &[], &[read_tool()])
        .await
        .unwrap();

    assert_eq!(message.text(), "");
    assert_eq!(message.usage, Usage::new(50, 7));
    let calls = message.tool_calls();
    assert_eq!(calls[0].id, "call_9");
    assert_eq!(calls[0].arguments()["path"], "b");

    let body = last_request_body(&server).await;
    assert_eq!(body["temperature"], 0.7);
    assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");
}

#[tokio::test]
async fn openai_sends_one_tool_message_per_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Done."}, "finish_reason": "stop"}]
        })))
        .mount(&server)
        .await;

    let message = openai(&server)
        .create_message("", &history_with_two_results(), &[])
        .await
        .unwrap();
    assert_eq!(message.usage, Usage::default());

    let body = last_request_body(&server).await;
    let messages = body["messages"].as_array().unwrap();
    let roles: Vec<&str> = messages.iter().map(|m| m["role"].as_str().unwrap()).collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "tool", "tool"]);
    assert_eq!(messages[2]["tool_calls"].as_array().unwrap().len(), 2);
    assert_eq!(messages[4]["tool_call_id"], "t2");
    assert_eq!(messages[4]["content"], "B");
}

#[tokio::test]
async fn openai_without_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = openai(&server).create_message("hi", &[], &[]).await.unwrap_err();
    assert!(matches!(err, HostError::Provider { ref provider, .. } if provider == "openai"));
}

#[tokio::test]
async fn openai_server_overload_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"message": "The server is overloaded", "type": "server_error", "code": "server_is_overloaded"}
        })))
        .mount(&server)
        .await;

    let err = openai(&server).create_message("hi", &[], &[]).await.unwrap_err();
    assert!(matches!(err, HostError::Overloaded(_)));
}

#[tokio::test]
async fn factory_honours_base_url_override() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-env"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "hi from mock"}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut credentials = Credentials::default();
    credentials.set_api_key(ProviderKind::OpenAi, "sk-env");
    credentials.set_base_url(ProviderKind::OpenAi, server.uri());
    let settings = HostSettings::builder()
        .provider(ProviderKind::OpenAi)
        .credentials(credentials)
        .build();

    let provider = create_provider(&settings).unwrap();
    assert_eq!(provider.name(), "openai");
    assert_eq!(provider.model_id(), "gpt-4o");
    let message = provider.create_message("hello", &[], &[]).await.unwrap();
    assert_eq!(message.text(), "hi from mock");
}

// Azure

#[tokio::test]
async fn azure_targets_deployment_with_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/gpt4-prod/chat/completions"))
        .and(query_param("api-version", "2024-02-15-preview"))
        .and(header("api-key", "az-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "from azure"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AzureOpenAiProvider::new(
        "gpt-4o".into(),
        "az-key".into(),
        server.uri(),
        "gpt4-prod".into(),
        None,
        GenerationSettings::default(),
    );
    let message = provider.create_message("hi", &[], &[]).await.unwrap();

    assert_eq!(provider.name(), "azure");
    assert_eq!(message.text(), "from azure");
    assert_eq!(message.usage, Usage::new(3, 2));
}

// Ollama

#[tokio::test]
async fn ollama_mints_call_ids_and_reads_eval_counts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3.2", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "fs__read", "arguments": {"path": "c"}}}]
            },
            "done": true,
            "done_reason": "stop",
            "prompt_eval_count": 40,
            "eval_count": 9
        })))
        .expect(1)
        .mount(&server)
        .await;

    let message = ollama(&server)
        .create_message("read c", &[], &[read_tool()])
        .await
        .unwrap();

    let calls = message.tool_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].id.starts_with("tc_fs__read_"));
    assert_eq!(calls[0].arguments()["path"], "c");
    assert_eq!(message.usage, Usage::new(40, 9));

    let body = last_request_body(&server).await;
    assert_eq!(body["tools"][0]["function"]["parameters"]["properties"]["path"]["type"], "string");
}

#[tokio::test]
async fn ollama_missing_counts_report_zero_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "hello"},
            "done": true
        })))
        .mount(&server)
        .await;

    let message = ollama(&server).create_message("hi", &[], &[]).await.unwrap();
    assert_eq!(message.text(), "hello");
    assert!(message.usage.is_zero());
}

// Runs in real time: the mock server's delay is not driven by tokio's clock.
#[tokio::test]
async fn slow_generation_is_not_cut_off() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(125))
                .set_body_json(json!({
                    "message": {"role": "assistant", "content": "took a while"},
                    "done": true
                })),
        )
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let message = ollama(&server).create_message("hi", &[], &[]).await.unwrap();

    assert_eq!(message.text(), "took a while");
    assert!(started.elapsed() >= Duration::from_secs(125));
}

#[tokio::test]
async fn ollama_tool_support_follows_template() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/show"))
        .and(body_partial_json(json!({"model": "llama3.2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "modelfile": "FROM llama3.2",
            "template": "{{- if .Tools }}{{ range .Tools }}{{ . }}{{ end }}{{ end }}"
        })))
        .mount(&server)
        .await;

    assert!(ollama(&server).supports_tools().await);
}

#[tokio::test]
async fn ollama_tool_support_false_without_marker_or_on_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/show"))
        .and(body_partial_json(json!({"model": "plain"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "modelfile": "FROM plain",
            "template": "{{ .Prompt }}"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/show"))
        .and(body_partial_json(json!({"model": "missing"})))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "model not found"})))
        .mount(&server)
        .await;

    let plain = OllamaProvider::new("plain".into(), Some(server.uri()), GenerationSettings::default());
    let missing =
        OllamaProvider::new("missing".into(), Some(server.uri()), GenerationSettings::default());
    assert!(!plain.supports_tools().await);
    assert!(!missing.supports_tools().await);
}
