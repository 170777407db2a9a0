//! Model provider trait and implementations.

pub mod format;
pub mod http;

#[cfg(feature = "anthropic")]
pub mod anthropic;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "azure")]
pub mod azure;

#[cfg(feature = "ollama")]
pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::config::HostSettings;
use crate::error::HostError;
use crate::tools::ToolDefinition;
use crate::types::{Message, ToolContent};

/// Backend family.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    #[default]
    Anthropic,
    #[strum(serialize = "openai")]
    #[serde(rename = "openai")]
    OpenAi,
    Azure,
    Ollama,
}

impl ProviderKind {
    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-5-sonnet-20240620",
            Self::OpenAi | Self::Azure => "gpt-4o",
            Self::Ollama => "llama3.2",
        }
    }
}

/// Core trait implemented by every backend adapter.
///
/// Adapters are stateless apart from their configuration, so a single
/// instance may serve many requests. Dropping the future returned by
/// [`ModelProvider::create_message`] abandons the request.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "anthropic", "ollama").
    fn name(&self) -> &str;

    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Whether the configured model can call tools.
    async fn supports_tools(&self) -> bool;

    /// Send the conversation and return the assistant reply.
    ///
    /// A non-empty `prompt` is appended as a final user message.
    async fn create_message(
        &self,
        prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message, HostError>;

    /// Wrap a tool's output in a message answering `tool_call_id`.
    fn create_tool_response(
        &self,
        tool_call_id: &str,
        content: ToolContent,
    ) -> Result<Message, HostError>;
}

/// Messages to send, with `prompt` appended when non-empty.
pub(crate) fn with_prompt(prompt: &str, messages: &[Message]) -> Vec<Message> {
    let mut all = messages.to_vec();
    if !prompt.is_empty() {
        all.push(Message::user(prompt));
    }
    all
}

/// Create the adapter selected by `settings`.
pub fn create_provider(settings: &HostSettings) -> Result<Box<dyn ModelProvider>, HostError> {
    let credentials = &settings.credentials;
    let model = settings.model_id();
    let generation = settings.generation();

    match settings.provider {
        #[cfg(feature = "anthropic")]
        ProviderKind::Anthropic => {
            let api_key = credentials
                .get_api_key(ProviderKind::Anthropic)
                .ok_or_else(|| HostError::Authentication("Missing ANTHROPIC_API_KEY".into()))?;
            Ok(Box::new(anthropic::AnthropicProvider::new(
                model,
                api_key,
                credentials.get_base_url(ProviderKind::Anthropic),
                generation,
            )))
        }
        #[cfg(feature = "openai")]
        ProviderKind::OpenAi => {
            let api_key = credentials
                .get_api_key(ProviderKind::OpenAi)
                .ok_or_else(|| HostError::Authentication("Missing OPENAI_API_KEY".into()))?;
            Ok(Box::new(openai::OpenAiProvider::new(
                model,
                api_key,
                credentials.get_base_url(ProviderKind::OpenAi),
                generation,
            )))
        }
        #[cfg(feature = "azure")]
        ProviderKind::Azure => {
            let api_key = credentials
                .get_api_key(ProviderKind::Azure)
                .ok_or_else(|| HostError::Authentication("Missing AZURE_OPENAI_API_KEY".into()))?;
            let endpoint = credentials.get_base_url(ProviderKind::Azure).ok_or_else(|| {
                HostError::Configuration("Missing AZURE_OPENAI_ENDPOINT".into())
            })?;
            let deployment = credentials
                .azure_deployment
                .clone()
                .unwrap_or_else(|| model.clone());
            Ok(Box::new(azure::AzureOpenAiProvider::new(
                model,
                api_key,
                endpoint,
                deployment,
                credentials.azure_api_version.clone(),
                generation,
            )))
        }
        #[cfg(feature = "ollama")]
        ProviderKind::Ollama => Ok(Box::new(ollama::OllamaProvider::new(
            model,
            credentials.get_base_url(ProviderKind::Ollama),
            generation,
        ))),
        #[allow(unreachable_patterns)]
        other => Err(HostError::Configuration(format!(
            "Provider '{other}' not enabled via feature flags"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use strum::IntoEnumIterator;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert!("gemini".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
    }

    #[test]
    fn every_kind_has_a_default_model() {
        for kind in ProviderKind::iter() {
            assert!(!kind.default_model().is_empty());
        }
    }

    #[test]
    fn missing_key_is_authentication_error() {
        let settings = HostSettings::builder()
            .provider(ProviderKind::Anthropic)
            .credentials(Credentials::default())
            .build();
        match create_provider(&settings) {
            Err(HostError::Authentication(msg)) => assert!(msg.contains("ANTHROPIC_API_KEY")),
            Err(other) => panic!("expected Authentication, got {other:?}"),
            Ok(_) => panic!("expected Authentication error"),
        }
    }

    #[test]
    fn ollama_needs_no_credentials() {
        let settings = HostSettings::builder()
            .provider(ProviderKind::Ollama)
            .credentials(Credentials::default())
            .build();
        let provider = create_provider(&settings).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model_id(), "llama3.2");
    }

    #[test]
    fn with_prompt_appends_user_message() {
        let history = vec![Message::user("a")];
        assert_eq!(with_prompt("", &history).len(), 1);
        let all = with_prompt("b", &history);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].text(), "b");
    }
}
