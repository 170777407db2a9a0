//! Provider-neutral message types.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use super::{FinishReason, Usage};
use crate::error::HostError;

/// A message in a conversation.
///
/// Every adapter converts to and from this shape, so history can be kept
/// in one form no matter which backend answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Usage::is_zero")]
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a message from raw blocks.
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content,
            usage: Usage::default(),
            finish_reason: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentBlock::text(text)])
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentBlock::text(text)])
    }

    /// Create a tool result message answering `tool_use_id`.
    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: Value,
        text: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::new(
            Role::Tool,
            vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content,
                text: text.into(),
                is_error,
            }],
        )
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_finish_reason(mut self, reason: Option<FinishReason>) -> Self {
        self.finish_reason = reason;
        self
    }

    /// Flag every tool result in this message as an error.
    pub fn into_error(mut self) -> Self {
        for block in &mut self.content {
            if let ContentBlock::ToolResult { is_error, .. } = block {
                *is_error = true;
            }
        }
        self
    }

    /// Text blocks joined with a space and trimmed.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }

    /// Rendered text of the tool results carried by this message.
    pub fn tool_result_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Tool calls requested by this message, in order.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }

    /// Whether this message answers a tool call.
    pub fn is_tool_response(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolResult { .. }))
    }

    /// Id of the first tool call this message answers.
    pub fn tool_response_id(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
            _ => None,
        })
    }

    /// No non-empty text and no tool calls.
    pub fn is_contentless(&self) -> bool {
        !self.content.iter().any(|block| match block {
            ContentBlock::Text { text } => !text.is_empty(),
            ContentBlock::ToolUse { .. } => true,
            ContentBlock::ToolResult { .. } => false,
        })
    }

    /// Drop tool-use blocks whose id is in `ids`.
    pub fn remove_tool_uses(&mut self, ids: &HashSet<String>) {
        self.content
            .retain(|block| !matches!(block, ContentBlock::ToolUse { id, .. } if ids.contains(id)));
    }
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single block of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        /// Structured payload as returned by the tool.
        content: Value,
        /// Payload rendered as text for backends that only accept strings.
        #[serde(default)]
        text: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    /// Namespaced name, `<collaborator>__<tool>`.
    pub name: String,
    pub input: Value,
}

impl ToolCall {
    /// Argument map; malformed or non-object input yields an empty map.
    pub fn arguments(&self) -> Map<String, Value> {
        self.parse_arguments().unwrap_or_default()
    }

    /// Argument map, failing when the model sent something that is not a JSON object.
    pub fn parse_arguments(&self) -> Result<Map<String, Value>, HostError> {
        match &self.input {
            Value::Object(map) => Ok(map.clone()),
            Value::Null => Ok(Map::new()),
            Value::String(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Value::String(raw) => match serde_json::from_str::<Value>(raw)? {
                Value::Object(map) => Ok(map),
                other => Err(HostError::InvalidArgument(format!(
                    "tool arguments must be a JSON object, got {other}"
                ))),
            },
            other => Err(HostError::InvalidArgument(format!(
                "tool arguments must be a JSON object, got {other}"
            ))),
        }
    }
}

/// Raw output of a tool, before an adapter turns it into a message.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolContent {
    Text(String),
    Bytes(Vec<u8>),
    Json(Value),
}

impl From<String> for ToolContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for ToolContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for ToolContent {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Value> for ToolContent {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}
