//! Namespaced tool routing across collaborators.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::collaborator::ToolCollaborator;
use super::types::ToolDefinition;
use crate::error::{HostError, Result};
use crate::util::timeout::with_timeout;

/// Separator between collaborator and tool in a namespaced name.
pub const TOOL_NAME_SEPARATOR: &str = "__";

/// `<collaborator>__<tool>`
pub fn namespaced_tool_name(collaborator: &str, tool: &str) -> String {
    format!("{collaborator}{TOOL_NAME_SEPARATOR}{tool}")
}

/// Split a namespaced name into `(collaborator, tool)`.
///
/// The name must contain the separator exactly once.
pub fn parse_tool_name(name: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = name.split(TOOL_NAME_SEPARATOR).collect();
    match parts.as_slice() {
        [collaborator, tool] => Ok((*collaborator, *tool)),
        _ => Err(HostError::InvalidToolName(name.to_string())),
    }
}

/// Collaborators keyed by name.
#[derive(Default)]
pub struct CollaboratorRegistry {
    collaborators: BTreeMap<String, Arc<dyn ToolCollaborator>>,
}

impl CollaboratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collaborator, replacing any previous one with the same name.
    pub fn register(&mut self, collaborator: Arc<dyn ToolCollaborator>) {
        let name = collaborator.name().to_string();
        if self.collaborators.insert(name.clone(), collaborator).is_some() {
            warn!(collaborator = %name, "Replaced existing collaborator");
        }
    }

    pub fn with(mut self, collaborator: Arc<dyn ToolCollaborator>) -> Self {
        self.register(collaborator);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolCollaborator>> {
        self.collaborators.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collaborators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.collaborators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collaborators.is_empty()
    }

    /// Resolve a namespaced tool name to its collaborator and local tool name.
    pub fn resolve(&self, namespaced: &str) -> Result<(Arc<dyn ToolCollaborator>, String)> {
        let (collaborator, tool) = parse_tool_name(namespaced)?;
        let found = self
            .collaborators
            .get(collaborator)
            .ok_or_else(|| HostError::UnknownCollaborator(collaborator.to_string()))?;
        Ok((Arc::clone(found), tool.to_string()))
    }

    /// Tool listings per collaborator, each bounded by `timeout`.
    pub async fn list_by_collaborator(
        &self,
        timeout: Duration,
    ) -> Vec<(String, Result<Vec<ToolDefinition>>)> {
        let mut listings = Vec::with_capacity(self.collaborators.len());
        for (name, collaborator) in &self.collaborators {
            let tools = with_timeout(timeout, collaborator.list_tools()).await;
            listings.push((name.clone(), tools));
        }
        listings
    }

    /// Namespaced definitions of every tool the model may call.
    ///
    /// A collaborator whose listing fails is logged and left out.
    pub async fn tool_definitions(&self, timeout: Duration) -> Vec<ToolDefinition> {
        let mut definitions = Vec::new();
        for (name, listing) in self.list_by_collaborator(timeout).await {
            match listing {
                Ok(tools) => {
                    debug!(collaborator = %name, count = tools.len(), "Listed tools");
                    definitions.extend(tools.into_iter().map(|t| t.namespaced(&name)));
                }
                Err(e) => error!(collaborator = %name, error = %e, "Error fetching tools"),
            }
        }
        definitions
    }

    /// Close every collaborator, logging failures.
    pub async fn close_all(&self) {
        for (name, collaborator) in &self.collaborators {
            if let Err(e) = collaborator.close().await {
                warn!(collaborator = %name, error = %e, "Failed to close collaborator");
            }
        }
    }
}

impl std::fmt::Debug for CollaboratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaboratorRegistry")
            .field("collaborators", &self.collaborators.keys().collect::<Vec<_>>())
            .finish()
    }
}
