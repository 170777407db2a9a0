//! Azure OpenAI provider.

use async_trait::async_trait;

use crate::error::HostError;
use crate::tools::ToolDefinition;
use crate::types::{GenerationSettings, Message, ToolContent};

use super::openai::{OpenAiAuth, OpenAiProvider};
use super::ModelProvider;

pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// Azure OpenAI Service provider.
pub struct AzureOpenAiProvider {
    inner: OpenAiProvider,
}

impl AzureOpenAiProvider {
    /// `endpoint`: e.g., "https://myresource.openai.azure.com"
    /// `deployment`: e.g., "gpt-4o"
    pub fn new(
        model: String,
        api_key: String,
        endpoint: String,
        deployment: String,
        api_version: Option<String>,
        generation: GenerationSettings,
    ) -> Self {
        let chat_url = deployment_url(
            &endpoint,
            &deployment,
            api_version.as_deref().unwrap_or(DEFAULT_API_VERSION),
        );
        Self {
            inner: OpenAiProvider::with_endpoint(
                "azure",
                model,
                OpenAiAuth::ApiKeyHeader(api_key),
                chat_url,
                generation,
            ),
        }
    }
}

fn deployment_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        api_version
    )
}

#[async_trait]
impl ModelProvider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn supports_tools(&self) -> bool {
        self.inner.supports_tools().await
    }

    async fn create_message(
        &self,
        prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message, HostError> {
        self.inner.create_message(prompt, messages, tools).await
    }

    fn create_tool_response(
        &self,
        tool_call_id: &str,
        content: ToolContent,
    ) -> Result<Message, HostError> {
        self.inner.create_tool_response(tool_call_id, content)
    }
}
