//! Model Context Protocol tool servers as collaborators.

pub mod client;

pub use client::{McpCollaborator, McpRunningService};

use std::sync::Arc;

use tracing::{error, info};

use crate::config::McpConfig;
use crate::error::HostError;
use crate::tools::CollaboratorRegistry;

/// Start every configured server and register it under its config name.
///
/// Any server failing to start aborts the whole set; servers already
/// started are shut down before the error is returned.
pub async fn connect_servers(config: &McpConfig) -> Result<CollaboratorRegistry, HostError> {
    config.validate()?;
    let mut registry = CollaboratorRegistry::new();

    for (name, server) in &config.mcp_servers {
        match McpCollaborator::connect(name.as_str(), server).await {
            Ok(collaborator) => registry.register(Arc::new(collaborator)),
            Err(e) => {
                error!(server = %name, error = %e, "Error creating client");
                registry.close_all().await;
                return Err(e);
            }
        }
    }

    info!(servers = registry.len(), "Tool servers ready");
    Ok(registry)
}
