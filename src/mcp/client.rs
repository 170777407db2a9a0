//! Stdio tool server collaborator.

use std::time::Duration;

use async_trait::async_trait;
use rmcp::{
    model::{
        CallToolRequestParams, CallToolResult, ClientInfo, Content, ProtocolVersion,
        ResourceContents,
    },
    service::{
        ClientInitializeError, DynService, Peer, RoleClient, RunningService, ServiceError,
        ServiceExt,
    },
    transport::TokioChildProcess,
};
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::McpServerConfig;
use crate::error::HostError;
use crate::tools::{ToolArguments, ToolCollaborator, ToolDefinition, ToolInputSchema};
use crate::types::ToolContent;
use crate::util::timeout::with_timeout;

/// How long a server gets to answer the initialize handshake.
pub const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(30);

type DynClientService = Box<dyn DynService<RoleClient>>;
pub type McpRunningService = RunningService<RoleClient, DynClientService>;

/// A tool server spoken to over the child process's stdin and stdout.
pub struct McpCollaborator {
    name: String,
    session: Mutex<Option<McpRunningService>>,
}

impl McpCollaborator {
    /// Spawn the server process and complete the initialize handshake.
    pub async fn connect(name: impl Into<String>, config: &McpServerConfig) -> Result<Self, HostError> {
        Self::connect_with_timeout(name, config, INITIALIZE_TIMEOUT).await
    }

    /// Like [`connect`](Self::connect), giving up on the handshake after `timeout`.
    ///
    /// The child process is killed when the handshake does not finish in time.
    pub async fn connect_with_timeout(
        name: impl Into<String>,
        config: &McpServerConfig,
        timeout: Duration,
    ) -> Result<Self, HostError> {
        let name = name.into();
        let mut command = Command::new(&config.command);
        command.args(&config.args).envs(&config.env).kill_on_drop(true);

        let transport = TokioChildProcess::new(command).map_err(|e| {
            HostError::Configuration(format!("failed to start server '{name}': {e}"))
        })?;

        let client_info = ClientInfo {
            protocol_version: ProtocolVersion::LATEST,
            ..Default::default()
        };
        let handshake = async move {
            client_info
                .into_dyn()
                .serve(transport)
                .await
                .map_err(map_client_initialize_error)
        };
        let session = with_timeout(timeout, handshake).await.map_err(|e| match e {
            HostError::Timeout(ms) => HostError::Configuration(format!(
                "server '{name}' did not finish initializing within {ms}ms"
            )),
            other => other,
        })?;

        info!(server = %name, command = %config.command, "Connected to tool server");
        Ok(Self::from_running_service(name, session))
    }

    /// Wrap an already-initialized rmcp session.
    pub fn from_running_service(name: impl Into<String>, session: McpRunningService) -> Self {
        Self {
            name: name.into(),
            session: Mutex::new(Some(session)),
        }
    }

    async fn peer(&self) -> Result<Peer<RoleClient>, HostError> {
        let guard = self.session.lock().await;
        match guard.as_ref() {
            Some(session) if !session.is_closed() => Ok(session.peer().clone()),
            _ => Err(HostError::provider(
                "mcp",
                format!("session with '{}' is closed", self.name),
            )),
        }
    }
}

#[async_trait]
impl ToolCollaborator for McpCollaborator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, HostError> {
        let peer = self.peer().await?;

        // Servers without pagination support reject the cursor loop.
        let tools = match peer.list_all_tools().await {
            Ok(tools) => tools,
            Err(ServiceError::UnexpectedResponse) => {
                peer.list_tools(None)
                    .await
                    .map_err(|e| map_service_error("list_tools", e))?
                    .tools
            }
            Err(e) => return Err(map_service_error("list_tools", e)),
        };

        debug!(server = %self.name, count = tools.len(), "Server listed tools");
        Ok(tools.into_iter().map(map_tool_definition).collect())
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        args: &ToolArguments,
    ) -> Result<ToolContent, HostError> {
        let peer = self.peer().await?;
        let result = peer
            .call_tool(CallToolRequestParams {
                meta: None,
                name: tool_name.to_owned().into(),
                arguments: Some(args.as_map().clone()),
                task: None,
            })
            .await
            .map_err(|e| map_service_error("call_tool", e))?;

        map_call_result(tool_name, result)
    }

    async fn close(&self) -> Result<(), HostError> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };
        let reason = session
            .cancel()
            .await
            .map_err(|e| HostError::provider("mcp", format!("failed to stop '{}': {e}", self.name)))?;
        debug!(server = %self.name, ?reason, "Tool server session closed");
        Ok(())
    }
}

impl std::fmt::Debug for McpCollaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpCollaborator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn map_tool_definition(tool: rmcp::model::Tool) -> ToolDefinition {
    let schema = Value::Object((*tool.input_schema).clone());
    ToolDefinition::new(
        tool.name.to_string(),
        tool.description.map(|d| d.to_string()).unwrap_or_default(),
        ToolInputSchema::from_value(&schema),
    )
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let mut lines = Vec::new();
    for item in content {
        if let Some(text) = item.as_text() {
            lines.push(text.text.clone());
            continue;
        }
        if let Some(resource) = item.as_resource() {
            if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
                lines.push(text.clone());
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Structured content wins; otherwise the raw content items go through so
/// adapters can flatten text items their own way.
fn map_call_result(name: &str, result: CallToolResult) -> Result<ToolContent, HostError> {
    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or_else(|| extract_text_content(&result.content))
            .unwrap_or_else(|| "tool returned an error result".into());

        return Err(HostError::ToolExecution {
            tool_name: name.to_string(),
            message,
        });
    }

    if let Some(structured) = result.structured_content {
        return Ok(ToolContent::Json(structured));
    }

    let content = result
        .content
        .iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect::<Vec<_>>();
    Ok(ToolContent::Json(Value::Array(content)))
}

fn map_client_initialize_error(error: ClientInitializeError) -> HostError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            HostError::provider("mcp", format!("initialize connection closed: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => {
            HostError::provider("mcp", format!("initialize transport error ({context}): {error}"))
        }
        ClientInitializeError::JsonRpcError(error) => HostError::provider(
            "mcp",
            format!("initialize JSON-RPC error {}: {}", error.code.0, error.message),
        ),
        ClientInitializeError::Cancelled => HostError::provider("mcp", "initialize cancelled"),
        other => HostError::provider("mcp", format!("initialize error: {other}")),
    }
}

fn map_service_error(context: &str, error: ServiceError) -> HostError {
    match error {
        ServiceError::McpError(error) => HostError::provider(
            "mcp",
            format!("{context}: error {}: {}", error.code.0, error.message),
        ),
        ServiceError::TransportSend(error) => {
            HostError::provider("mcp", format!("{context}: transport send failed: {error}"))
        }
        ServiceError::TransportClosed => {
            HostError::provider("mcp", format!("{context}: transport closed"))
        }
        ServiceError::UnexpectedResponse => {
            HostError::provider("mcp", format!("{context}: unexpected response"))
        }
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            HostError::provider("mcp", format!("{context}: request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => HostError::Timeout(timeout.as_millis() as u64),
        other => HostError::provider("mcp", format!("{context}: service error: {other}")),
    }
}
