//! OpenAI Chat Completions API provider.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::HostError;
use crate::tools::ToolDefinition;
use crate::types::*;

use super::format::{
    flatten_text_items, render_tool_content, tool_response_message, EMPTY_FUNCTION_RESULT,
};
use super::http::{api_key_headers, bearer_headers, post_json};
use super::{with_prompt, ModelProvider};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// How requests authenticate.
#[derive(Debug, Clone)]
pub enum OpenAiAuth {
    /// `Authorization: Bearer <key>` (OpenAI).
    Bearer(String),
    /// `api-key: <key>` (Azure).
    ApiKeyHeader(String),
}

pub struct OpenAiProvider {
    name: &'static str,
    model: String,
    auth: OpenAiAuth,
    chat_url: String,
    generation: GenerationSettings,
}

impl OpenAiProvider {
    pub fn new(
        model: String,
        api_key: String,
        base_url: Option<String>,
        generation: GenerationSettings,
    ) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::with_endpoint(
            "openai",
            model,
            OpenAiAuth::Bearer(api_key),
            format!("{}/chat/completions", base_url.trim_end_matches('/')),
            generation,
        )
    }

    /// Point the adapter at a fully-formed chat completions URL.
    pub fn with_endpoint(
        name: &'static str,
        model: String,
        auth: OpenAiAuth,
        chat_url: String,
        generation: GenerationSettings,
    ) -> Self {
        Self {
            name,
            model,
            auth,
            chat_url,
            generation,
        }
    }

    fn headers(&self) -> HeaderMap {
        match &self.auth {
            OpenAiAuth::Bearer(key) => bearer_headers(key),
            OpenAiAuth::ApiKeyHeader(key) => api_key_headers(key),
        }
    }

    fn build_request_body(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let messages: Vec<Value> = messages.iter().flat_map(message_to_openai).collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.generation.max_tokens,
            "temperature": self.generation.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        });

        if !tools.is_empty() {
            let tool_defs: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema.to_value(),
                        }
                    })
                })
                .collect();
            if let Some(obj) = body.as_object_mut() {
                obj.insert("tools".into(), tool_defs.into());
            }
        }

        body
    }
}

/// Convert one message; a tool message may expand into one entry per result.
fn message_to_openai(msg: &Message) -> Vec<Value> {
    match msg.role {
        Role::Tool => msg
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    text,
                    ..
                } => {
                    let text = if text.is_empty() {
                        flatten_text_items(content).unwrap_or_default()
                    } else {
                        text.clone()
                    };
                    let text = if text.is_empty() {
                        EMPTY_FUNCTION_RESULT.to_string()
                    } else {
                        text
                    };
                    Some(json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": text,
                    }))
                }
                _ => None,
            })
            .collect(),
        Role::Assistant if msg.has_tool_calls() => {
            let tool_calls: Vec<Value> = msg
                .tool_calls()
                .into_iter()
                .map(|tc| {
                    let arguments = match tc.input {
                        Value::String(raw) => raw,
                        Value::Null => "{}".to_string(),
                        other => other.to_string(),
                    };
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": arguments,
                        }
                    })
                })
                .collect();
            let text = msg.text();
            vec![json!({
                "role": "assistant",
                "content": if text.is_empty() { Value::Null } else { Value::String(text) },
                "tool_calls": tool_calls,
            })]
        }
        role => vec![json!({ "role": role.to_string(), "content": msg.text() })],
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn supports_tools(&self) -> bool {
        true
    }

    async fn create_message(
        &self,
        prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message, HostError> {
        let body = self.build_request_body(&with_prompt(prompt, messages), tools);

        debug!(
            provider = self.name,
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "OpenAI create_message"
        );

        let data: OpenAiChatResponse = post_json(&self.chat_url, self.headers(), &body).await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| HostError::provider(self.name, "no choices in response"))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            content.push(ContentBlock::Text { text });
        }
        for tc in choice.message.tool_calls.unwrap_or_default() {
            let input = serde_json::from_str(&tc.function.arguments)
                .unwrap_or(Value::String(tc.function.arguments));
            content.push(ContentBlock::ToolUse {
                id: tc.id,
                name: tc.function.name,
                input,
            });
        }

        let usage = data
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(Message::new(Role::Assistant, content)
            .with_usage(usage)
            .with_finish_reason(choice.finish_reason.as_deref().and_then(FinishReason::from_provider)))
    }

    /// Arrays of text items are flattened to newline-joined text.
    fn create_tool_response(
        &self,
        tool_call_id: &str,
        content: ToolContent,
    ) -> Result<Message, HostError> {
        let rendered = match &content {
            ToolContent::Json(value @ Value::Array(_)) => match flatten_text_items(value) {
                Some(text) => text,
                None => render_tool_content(&content)?,
            },
            _ => render_tool_content(&content)?,
        };
        Ok(tool_response_message(tool_call_id, &content, rendered))
    }
}

// OpenAI API response types (internal)

#[derive(Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
