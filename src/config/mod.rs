//! Configuration: host settings, provider credentials and tool server config.

pub mod mcp;

pub use mcp::{McpConfig, McpServerConfig};

pub use crate::provider::ProviderKind;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use bon::Builder;

use crate::history::DEFAULT_MESSAGE_WINDOW;
use crate::types::{GenerationSettings, DEFAULT_MAX_TOKENS};
use crate::util::retry::RetryPolicy;

/// Per-call budget for tool invocations and tool listing.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

/// API keys, endpoint overrides and Azure deployment details.
#[derive(Clone, Default)]
pub struct Credentials {
    api_keys: HashMap<ProviderKind, String>,
    base_urls: HashMap<ProviderKind, String>,
    pub azure_deployment: Option<String>,
    pub azure_api_version: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_keys", &self.api_keys.keys().collect::<Vec<_>>())
            .field("base_urls", &self.base_urls)
            .field("azure_deployment", &self.azure_deployment)
            .field("azure_api_version", &self.azure_api_version)
            .finish()
    }
}

impl Credentials {
    /// Load from environment variables, reading `.env` first if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve variables through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut credentials = Self::default();

        let key_mappings = [
            ("ANTHROPIC_API_KEY", ProviderKind::Anthropic),
            ("OPENAI_API_KEY", ProviderKind::OpenAi),
            ("AZURE_OPENAI_API_KEY", ProviderKind::Azure),
        ];
        for (env_var, provider) in key_mappings {
            if let Some(key) = lookup(env_var) {
                credentials.set_api_key(provider, key);
            }
        }

        // Base URL overrides
        let url_mappings = [
            ("ANTHROPIC_BASE_URL", ProviderKind::Anthropic),
            ("OPENAI_BASE_URL", ProviderKind::OpenAi),
            ("AZURE_OPENAI_ENDPOINT", ProviderKind::Azure),
            ("OLLAMA_HOST", ProviderKind::Ollama),
        ];
        for (env_var, provider) in url_mappings {
            if let Some(url) = lookup(env_var) {
                credentials.set_base_url(provider, url);
            }
        }

        credentials.azure_deployment = lookup("AZURE_OPENAI_DEPLOYMENT");
        credentials.azure_api_version = lookup("AZURE_OPENAI_API_VERSION");
        credentials
    }

    pub fn set_api_key(&mut self, provider: ProviderKind, key: impl Into<String>) {
        self.api_keys.insert(provider, key.into());
    }

    pub fn get_api_key(&self, provider: ProviderKind) -> Option<String> {
        self.api_keys.get(&provider).cloned()
    }

    pub fn set_base_url(&mut self, provider: ProviderKind, url: impl Into<String>) {
        self.base_urls.insert(provider, url.into());
    }

    pub fn get_base_url(&self, provider: ProviderKind) -> Option<String> {
        self.base_urls.get(&provider).cloned()
    }

    /// Whether an API key is configured. Ollama needs none.
    pub fn has_credentials(&self, provider: ProviderKind) -> bool {
        provider == ProviderKind::Ollama || self.api_keys.contains_key(&provider)
    }
}

/// Everything the host needs to run turns.
#[derive(Debug, Clone, Builder)]
pub struct HostSettings {
    #[builder(default)]
    pub provider: ProviderKind,
    /// Model id; falls back to [`ProviderKind::default_model`].
    #[builder(into)]
    pub model: Option<String>,
    /// Messages kept in history before each model request.
    #[builder(default = DEFAULT_MESSAGE_WINDOW)]
    pub message_window: usize,
    #[builder(default = DEFAULT_TOOL_TIMEOUT)]
    pub tool_timeout: Duration,
    #[builder(default)]
    pub retry: RetryPolicy,
    /// Cap on model round-trips per turn. Unbounded when unset.
    pub max_turns: Option<usize>,
    #[builder(default = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    #[builder(into)]
    pub system_prompt: Option<String>,
    #[builder(default)]
    pub credentials: Credentials,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HostSettings {
    /// Configured model, or the provider's default.
    pub fn model_id(&self) -> String {
        self.model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Sampling settings handed to the adapter.
    pub fn generation(&self) -> GenerationSettings {
        GenerationSettings {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}
