//! Anthropic Messages API provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::HostError;
use crate::tools::ToolDefinition;
use crate::types::*;

use super::format::{render_tool_content, tool_response_message};
use super::http::{anthropic_headers, post_json};
use super::{with_prompt, ModelProvider};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    model: String,
    api_key: String,
    base_url: String,
    generation: GenerationSettings,
}

impl AnthropicProvider {
    /// `base_url` may be given with or without the trailing `/v1`.
    pub fn new(
        model: String,
        api_key: String,
        base_url: Option<String>,
        generation: GenerationSettings,
    ) -> Self {
        Self {
            base_url: base_url
                .map(|url| normalize_base_url(&url))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
            api_key,
            generation,
        }
    }

    fn build_request_body(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let mut system_parts = Vec::new();
        let mut wire: Vec<Value> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(msg.text()),
                Role::User => {
                    let content: Vec<Value> = msg
                        .content
                        .iter()
                        .filter_map(|block| match block {
                            ContentBlock::Text { text } if !text.is_empty() => {
                                Some(json!({"type": "text", "text": text}))
                            }
                            ContentBlock::ToolResult { .. } => Some(tool_result_block(block)),
                            _ => None,
                        })
                        .collect();
                    push_message(&mut wire, "user", content);
                }
                Role::Assistant => {
                    let content: Vec<Value> = msg
                        .content
                        .iter()
                        .filter_map(|block| match block {
                            ContentBlock::Text { text } if !text.is_empty() => {
                                Some(json!({"type": "text", "text": text}))
                            }
                            ContentBlock::ToolUse { id, name, input } => Some(json!({
                                "type": "tool_use",
                                "id": id,
                                "name": name,
                                "input": if input.is_object() { input.clone() } else { json!({}) },
                            })),
                            _ => None,
                        })
                        .collect();
                    push_message(&mut wire, "assistant", content);
                }
                Role::Tool => {
                    let content: Vec<Value> = msg
                        .content
                        .iter()
                        .filter(|block| matches!(block, ContentBlock::ToolResult { .. }))
                        .map(tool_result_block)
                        .collect();
                    // Results for one assistant turn travel together in a single user message.
                    let merges = wire.last().is_some_and(|last| {
                        last["role"] == "user"
                            && last["content"]
                                .as_array()
                                .is_some_and(|c| c.iter().all(|b| b["type"] == "tool_result"))
                    });
                    if merges {
                        if let Some(existing) =
                            wire.last_mut().and_then(|last| last["content"].as_array_mut())
                        {
                            existing.extend(content);
                        }
                    } else {
                        push_message(&mut wire, "user", content);
                    }
                }
            }
        }

        let mut body = json!({
            "model": self.model,
            "messages": wire,
            "max_tokens": self.generation.max_tokens,
        });

        if let Some(obj) = body.as_object_mut() {
            if !system_parts.is_empty() {
                obj.insert("system".into(), system_parts.join("\n").into());
            }
            if let Some(temp) = self.generation.temperature {
                obj.insert("temperature".into(), temp.into());
            }
            if !tools.is_empty() {
                let tool_defs: Vec<Value> = tools
                    .iter()
                    .map(|t| {
                        json!({
                            "name": t.name,
                            "description": t.description,
                            "input_schema": t.input_schema.to_value(),
                        })
                    })
                    .collect();
                obj.insert("tools".into(), tool_defs.into());
            }
        }

        body
    }
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

fn tool_result_block(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::ToolResult {
            tool_use_id,
            text,
            is_error,
            ..
        } => json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": text,
            "is_error": is_error,
        }),
        _ => Value::Null,
    }
}

/// Empty messages are rejected by the API, so they are dropped.
fn push_message(wire: &mut Vec<Value>, role: &str, content: Vec<Value>) {
    if content.is_empty() {
        debug!(role, "Skipping empty message");
        return;
    }
    wire.push(json!({"role": role, "content": content}));
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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
        let url = format!("{}/messages", self.base_url);

        debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Anthropic create_message"
        );

        let data: AnthropicResponse =
            post_json(&url, anthropic_headers(&self.api_key, API_VERSION), &body).await?;

        let content = data
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(ContentBlock::Text { text }),
                AnthropicContentBlock::ToolUse { id, name, input } => {
                    Some(ContentBlock::ToolUse { id, name, input })
                }
                AnthropicContentBlock::Other => None,
            })
            .collect();

        Ok(Message::new(Role::Assistant, content)
            .with_usage(Usage::new(data.usage.input_tokens, data.usage.output_tokens))
            .with_finish_reason(data.stop_reason.as_deref().and_then(FinishReason::from_provider)))
    }

    fn create_tool_response(
        &self,
        tool_call_id: &str,
        content: ToolContent,
    ) -> Result<Message, HostError> {
        let rendered = render_tool_content(&content)?;
        Ok(tool_response_message(tool_call_id, &content, rendered))
    }
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Default)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}
