//! Error types for toolhost.

pub mod unified;

pub use unified::{ErrorCategory, ProviderErrorBody, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all toolhost operations.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The backend reported a transient overload. Retried by [`crate::util::retry::RetryPolicy`].
    #[error("Provider overloaded: {0}")]
    Overloaded(String),

    /// Retries against an overloaded backend were exhausted.
    #[error("service is currently overloaded after {attempts} attempts. please wait a few minutes and try again")]
    ServiceOverloaded { attempts: u32 },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid tool name format: {0}")]
    InvalidToolName(String),

    #[error("Server not found: {0}")]
    UnknownCollaborator(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("Turn exceeded {0} model round-trips")]
    MaxTurnsExceeded(usize),

    #[error("Turn cancelled")]
    Cancelled,
}

impl HostError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Overloaded(_) => ErrorCategory::Overloaded,
            Self::ServiceOverloaded { .. } => ErrorCategory::Server,
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited(_) => ErrorCategory::RateLimit,
            Self::Network(_) | Self::Io(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) | Self::InvalidArgument(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::Provider { .. } => ErrorCategory::Api,
            Self::InvalidToolName(_) | Self::UnknownCollaborator(_) => {
                ErrorCategory::ToolInvocation
            }
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::MaxTurnsExceeded(_) | Self::Cancelled => ErrorCategory::Turn,
        }
    }

    /// Whether the retry wrapper should back off and try again.
    ///
    /// Only overload signals are transient. Rate limits, auth failures and
    /// malformed requests surface immediately.
    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Overloaded
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::Overloaded | ErrorCategory::Server => RecoverySuggestion::WaitAndRetry,
            ErrorCategory::RateLimit | ErrorCategory::Network => {
                RecoverySuggestion::RetryWithBackoff
            }
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::ToolInvocation | ErrorCategory::ToolExecution => {
                RecoverySuggestion::CheckToolServer
            }
            ErrorCategory::Turn => RecoverySuggestion::ReducePromptScope,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_overload_is_transient() {
        assert!(HostError::Overloaded("busy".into()).is_transient());
        assert!(!HostError::RateLimited("slow down".into()).is_transient());
        assert!(!HostError::Authentication("bad key".into()).is_transient());
        assert!(!HostError::api(500, "boom").is_transient());
        assert!(!HostError::ServiceOverloaded { attempts: 6 }.is_transient());
    }

    #[test]
    fn api_status_drives_category() {
        assert_eq!(HostError::api(401, "x").category(), ErrorCategory::Authentication);
        assert_eq!(HostError::api(429, "x").category(), ErrorCategory::RateLimit);
        assert_eq!(HostError::api(502, "x").category(), ErrorCategory::Server);
        assert_eq!(HostError::api(400, "x").category(), ErrorCategory::Api);
    }

    #[test]
    fn exhausted_overload_message_asks_user_to_wait() {
        let msg = HostError::ServiceOverloaded { attempts: 6 }.to_string();
        assert!(msg.contains("please wait a few minutes"));
    }

    #[test]
    fn tool_name_errors_suggest_checking_servers() {
        let err = HostError::UnknownCollaborator("fs".into());
        assert_eq!(err.category(), ErrorCategory::ToolInvocation);
        assert_eq!(err.recovery_suggestion(), RecoverySuggestion::CheckToolServer);
    }
}
