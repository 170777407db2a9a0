//! Error classification, recovery hints and provider error payloads.

use serde::Deserialize;
use serde_json::Value;

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    /// Transient backend overload; the only category the retry wrapper retries.
    Overloaded,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    /// Malformed namespaced tool name or unknown collaborator.
    ToolInvocation,
    ToolExecution,
    /// Turn-level stop: cancellation or round-trip cap.
    Turn,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    WaitAndRetry,
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    CheckToolServer,
    ReducePromptScope,
    ContactSupport,
}

/// Error envelope returned by provider HTTP APIs.
///
/// Anthropic and OpenAI send `{"error": {"type": .., "message": ..}}`,
/// Ollama sends `{"error": "message"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderErrorBody {
    pub error: Value,
}

impl ProviderErrorBody {
    /// Parse a raw response body, if it carries an error envelope.
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    /// Provider error type, e.g. `overloaded_error`.
    pub fn error_type(&self) -> Option<&str> {
        self.error.get("type").and_then(Value::as_str)
    }

    /// Provider error code (OpenAI), e.g. `server_is_overloaded`.
    pub fn code(&self) -> Option<&str> {
        self.error.get("code").and_then(Value::as_str)
    }

    pub fn message(&self) -> Option<&str> {
        match &self.error {
            Value::String(s) => Some(s),
            other => other.get("message").and_then(Value::as_str),
        }
    }

    /// Whether the payload signals a transient overload.
    pub fn is_overloaded(&self) -> bool {
        [self.error_type(), self.code()]
            .into_iter()
            .flatten()
            .any(|s| s.contains("overloaded"))
    }

    /// `type: message` when both are present.
    pub fn describe(&self) -> String {
        match (self.error_type(), self.message()) {
            (Some(t), Some(m)) => format!("{t}: {m}"),
            (None, Some(m)) => m.to_string(),
            (Some(t), None) => t.to_string(),
            (None, None) => self.error.to_string(),
        }
    }
}
