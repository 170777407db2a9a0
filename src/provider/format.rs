//! Provider formatting helpers shared by the adapters.

use serde_json::Value;
use tracing::debug;

use crate::error::HostError;
use crate::types::{Message, ToolContent};

/// Substituted when a tool produced no output.
pub const EMPTY_TOOL_RESULT: &str = "No content returned from tool";

/// Substituted when an assistant tool call has no output to replay.
pub const EMPTY_FUNCTION_RESULT: &str = "No content returned from function";

/// Structured form of a tool's output.
pub fn tool_content_value(content: &ToolContent) -> Value {
    match content {
        ToolContent::Text(text) => Value::String(text.clone()),
        ToolContent::Bytes(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ToolContent::Json(value) => value.clone(),
    }
}

/// Tool output rendered as a string: text as-is, everything else as JSON.
pub fn render_tool_content(content: &ToolContent) -> Result<String, HostError> {
    Ok(match content {
        ToolContent::Text(text) => text.clone(),
        ToolContent::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ToolContent::Json(Value::String(text)) => text.clone(),
        ToolContent::Json(value) => serde_json::to_string(value)?,
    })
}

/// Collect the text of an array of content items.
///
/// Items may carry `text` as a string or an array of strings, or nest a
/// `content` array of text items. Returns `None` when nothing was found.
pub fn flatten_text_items(value: &Value) -> Option<String> {
    let items = value.as_array()?;
    let mut texts = Vec::new();
    for item in items {
        match item.get("text") {
            Some(Value::String(text)) => texts.push(text.clone()),
            Some(Value::Array(parts)) => {
                texts.extend(parts.iter().filter_map(Value::as_str).map(str::to_string))
            }
            _ => {
                if let Some(nested) = item.get("content").and_then(Value::as_array) {
                    texts.extend(
                        nested
                            .iter()
                            .filter_map(|c| c.get("text").and_then(Value::as_str))
                            .map(str::to_string),
                    );
                }
            }
        }
    }
    let joined = texts.join("\n");
    (!joined.is_empty()).then_some(joined)
}

/// Build a tool-role message answering `tool_call_id`.
///
/// Empty rendered output is replaced with [`EMPTY_TOOL_RESULT`].
pub fn tool_response_message(
    tool_call_id: &str,
    content: &ToolContent,
    rendered: String,
) -> Message {
    let text = if rendered.is_empty() {
        EMPTY_TOOL_RESULT.to_string()
    } else {
        rendered
    };
    debug!(tool_call_id, len = text.len(), "Created tool response");
    Message::tool_result(tool_call_id, tool_content_value(content), text, false)
}
