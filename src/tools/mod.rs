//! Tool system: definitions, collaborators and namespaced dispatch.

pub mod arguments;
pub mod collaborator;
pub mod registry;
pub mod types;

pub use arguments::ToolArguments;
pub use collaborator::{FunctionCollaborator, ToolCollaborator};
pub use registry::{namespaced_tool_name, parse_tool_name, CollaboratorRegistry, TOOL_NAME_SEPARATOR};
pub use types::{SchemaBuilder, ToolDefinition, ToolInputSchema};
