//! Generation settings and related enums.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Default completion budget sent with every request.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Sampling settings forwarded to a provider adapter.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct GenerationSettings {
    #[builder(default = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }
}

/// Why a model stopped producing output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

impl FinishReason {
    /// Map a provider's raw stop reason string.
    pub fn from_provider(raw: &str) -> Option<Self> {
        match raw {
            "end_turn" | "stop" | "stop_sequence" => Some(Self::Stop),
            "max_tokens" | "length" => Some(Self::Length),
            "tool_use" | "tool_calls" | "function_call" => Some(Self::ToolCalls),
            "content_filter" | "refusal" => Some(Self::ContentFilter),
            _ => None,
        }
    }
}
