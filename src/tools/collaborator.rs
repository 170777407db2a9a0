//! Tool collaborators: named groups of tools the host can call.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::arguments::ToolArguments;
use super::types::{ToolDefinition, ToolInputSchema};
use crate::error::HostError;
use crate::types::ToolContent;

/// An external component exposing a set of tools, usually a tool server.
///
/// Tools are addressed by their local name here; the registry adds the
/// `<collaborator>__` prefix before the model sees them.
#[async_trait]
pub trait ToolCollaborator: Send + Sync {
    /// Collaborator name, used as the namespace prefix.
    fn name(&self) -> &str;

    /// Tools this collaborator currently offers, with local names.
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, HostError>;

    /// Invoke a tool by local name.
    async fn call_tool(
        &self,
        tool_name: &str,
        args: &ToolArguments,
    ) -> Result<ToolContent, HostError>;

    /// Release the underlying connection.
    async fn close(&self) -> Result<(), HostError> {
        Ok(())
    }
}

type ToolHandler =
    dyn Fn(ToolArguments) -> BoxFuture<'static, Result<ToolContent, HostError>> + Send + Sync;

struct FunctionTool {
    definition: ToolDefinition,
    handler: Arc<ToolHandler>,
}

/// In-process collaborator backed by closures.
pub struct FunctionCollaborator {
    name: String,
    tools: BTreeMap<String, FunctionTool>,
}

impl FunctionCollaborator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool handled by `handler`.
    pub fn with_tool<F, Fut>(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: ToolInputSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolContent, HostError>> + Send + 'static,
    {
        let definition = ToolDefinition::new(name, description, input_schema);
        self.tools.insert(
            definition.name.clone(),
            FunctionTool {
                definition,
                handler: Arc::new(move |args| Box::pin(handler(args))),
            },
        );
        self
    }
}

#[async_trait]
impl ToolCollaborator for FunctionCollaborator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, HostError> {
        Ok(self.tools.values().map(|t| t.definition.clone()).collect())
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        args: &ToolArguments,
    ) -> Result<ToolContent, HostError> {
        let tool = self.tools.get(tool_name).ok_or_else(|| HostError::ToolExecution {
            tool_name: tool_name.to_string(),
            message: format!("unknown tool on '{}'", self.name),
        })?;
        (tool.handler)(args.clone()).await
    }
}

impl std::fmt::Debug for FunctionCollaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionCollaborator")
            .field("name", &self.name)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> FunctionCollaborator {
        FunctionCollaborator::new("util").with_tool(
            "echo",
            "Echo the input",
            ToolInputSchema::object().string("text", "Text to echo", true).build(),
            |args| async move { Ok(ToolContent::Text(args.get_str("text")?.to_string())) },
        )
    }

    #[tokio::test]
    async fn lists_local_names() {
        let tools = echo().list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");
    }

    #[tokio::test]
    async fn calls_handler() {
        let args = ToolArguments::from_value(serde_json::json!({"text": "hi"}));
        let out = echo().call_tool("echo", &args).await.unwrap();
        assert_eq!(out, ToolContent::Text("hi".into()));
    }

    #[tokio::test]
    async fn unknown_tool_is_execution_error() {
        let result = echo().call_tool("nope", &ToolArguments::default()).await;
        assert!(matches!(result, Err(HostError::ToolExecution { .. })));
    }
}
