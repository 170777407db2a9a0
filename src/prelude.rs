//! Convenience re-exports for common use.

pub use crate::agent_loop::{TurnEvent, TurnEventPayload, TurnOutcome, TurnRunner};
pub use crate::config::{Credentials, HostSettings, McpConfig, McpServerConfig};
pub use crate::error::{HostError, Result};
pub use crate::provider::{ModelProvider, ProviderKind};
pub use crate::tools::{
    CollaboratorRegistry, FunctionCollaborator, SchemaBuilder, ToolArguments, ToolCollaborator,
    ToolDefinition, ToolInputSchema,
};
pub use crate::types::{
    ContentBlock, FinishReason, GenerationSettings, Message, Role, ToolCall, ToolContent, Usage,
};
pub use crate::util::retry::RetryPolicy;

#[cfg(feature = "mcp")]
pub use crate::mcp::{connect_servers, McpCollaborator};
