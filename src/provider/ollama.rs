//! Ollama native chat API provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::HostError;
use crate::tools::ToolDefinition;
use crate::types::*;

use super::format::{render_tool_content, tool_response_message};
use super::http::{json_headers, post_json};
use super::{with_prompt, ModelProvider};

pub const DEFAULT_HOST: &str = "http://localhost:11434";

pub struct OllamaProvider {
    model: String,
    host: String,
    generation: GenerationSettings,
}

impl OllamaProvider {
    /// `host` defaults to the local daemon; a missing scheme is taken as http.
    pub fn new(model: String, host: Option<String>, generation: GenerationSettings) -> Self {
        Self {
            host: normalize_host(host.as_deref().unwrap_or(DEFAULT_HOST)),
            model,
            generation,
        }
    }

    fn build_request_body(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let messages: Vec<Value> = messages.iter().filter_map(message_to_ollama).collect();
        let tools: Vec<Value> = tools.iter().map(tool_to_ollama).collect();

        let mut options = Map::new();
        options.insert("num_predict".into(), self.generation.max_tokens.into());
        if let Some(temp) = self.generation.temperature {
            options.insert("temperature".into(), temp.into());
        }

        json!({
            "model": self.model,
            "messages": messages,
            "tools": tools,
            "stream": false,
            "options": options,
        })
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

/// Tool results go out as `tool` messages; empty messages are dropped.
fn message_to_ollama(msg: &Message) -> Option<Value> {
    if msg.is_tool_response() {
        let content = msg.tool_result_text();
        if content.is_empty() {
            return None;
        }
        return Some(json!({"role": "tool", "content": content}));
    }

    let text = msg.text();
    let tool_calls: Vec<Value> = if msg.role == Role::Assistant {
        msg.tool_calls()
            .into_iter()
            .filter(|call| !call.name.is_empty())
            .map(|call| {
                json!({
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments(),
                    }
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    if text.is_empty() && tool_calls.is_empty() {
        return None;
    }

    let mut wire = json!({"role": msg.role.to_string(), "content": text});
    if !tool_calls.is_empty() {
        if let Some(obj) = wire.as_object_mut() {
            obj.insert("tool_calls".into(), tool_calls.into());
        }
    }
    Some(wire)
}

/// Ollama accepts only `type`, `description` and `enum` per property.
fn tool_to_ollama(tool: &ToolDefinition) -> Value {
    let properties: Map<String, Value> = tool
        .input_schema
        .properties
        .iter()
        .filter_map(|(name, prop)| {
            let prop = prop.as_object()?;
            let mut converted = json!({
                "type": prop.get("type").and_then(Value::as_str).unwrap_or_default(),
                "description": prop.get("description").and_then(Value::as_str).unwrap_or_default(),
            });
            if let Some(values) = prop.get("enum").and_then(Value::as_array) {
                let values: Vec<&str> = values.iter().filter_map(Value::as_str).collect();
                if let Some(obj) = converted.as_object_mut() {
                    obj.insert("enum".into(), json!(values));
                }
            }
            Some((name.clone(), converted))
        })
        .collect();

    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": {
                "type": tool.input_schema.schema_type,
                "required": tool.input_schema.required,
                "properties": properties,
            }
        }
    })
}

/// Ollama does not assign call ids, so one is minted per call.
fn tool_call_id(name: &str) -> String {
    format!("tc_{}_{}", name, uuid::Uuid::new_v4().simple())
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    /// Asks the daemon whether the model's template handles tools.
    async fn supports_tools(&self) -> bool {
        let url = format!("{}/api/show", self.host);
        let body = json!({"model": self.model});
        match post_json::<OllamaShowResponse>(&url, json_headers(), &body).await {
            Ok(show) => {
                let template = show.template.unwrap_or_default();
                show.modelfile.unwrap_or_default().contains("<tools>")
                    || template.contains("<tools>")
                    || template.contains(".Tools")
            }
            Err(e) => {
                warn!(model = %self.model, error = %e, "Could not inspect Ollama model");
                false
            }
        }
    }

    async fn create_message(
        &self,
        prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message, HostError> {
        let body = self.build_request_body(&with_prompt(prompt, messages), tools);
        let url = format!("{}/api/chat", self.host);

        debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Ollama create_message"
        );

        let data: OllamaChatResponse = post_json(&url, json_headers(), &body).await?;

        let mut content = Vec::new();
        if !data.message.content.is_empty() {
            content.push(ContentBlock::Text {
                text: data.message.content,
            });
        }
        for call in data.message.tool_calls.unwrap_or_default() {
            content.push(ContentBlock::ToolUse {
                id: tool_call_id(&call.function.name),
                name: call.function.name,
                input: call.function.arguments,
            });
        }

        let usage = Usage::new(
            data.prompt_eval_count.unwrap_or_default(),
            data.eval_count.unwrap_or_default(),
        );

        Ok(Message::new(Role::Assistant, content)
            .with_usage(usage)
            .with_finish_reason(data.done_reason.as_deref().and_then(FinishReason::from_provider)))
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
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct OllamaShowResponse {
    #[serde(default)]
    modelfile: Option<String>,
    #[serde(default)]
    template: Option<String>,
}
