//! Tool server configuration (`~/.mcp.json`).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HostError, Result};
use crate::tools::TOOL_NAME_SEPARATOR;

/// File name of the tool server config in the home directory.
pub const CONFIG_FILE_NAME: &str = ".mcp.json";

/// How to launch one stdio tool server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

/// Tool servers keyed by the name used as their tool namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpConfig {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
}

impl McpConfig {
    /// `~/.mcp.json`
    pub fn default_path() -> Result<PathBuf> {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(CONFIG_FILE_NAME))
            .ok_or_else(|| HostError::Configuration("could not determine home directory".into()))
    }

    /// Load from `path`, or the default location when `None`.
    ///
    /// A missing file is created with an empty server map.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            let config = Self::default();
            std::fs::write(&path, serde_json::to_string_pretty(&config)?)?;
            info!(path = %path.display(), "Created default config file");
            return Ok(config);
        }

        let data = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&data).map_err(|e| {
            HostError::Configuration(format!("error parsing config file {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Server names become tool namespaces, so they may not contain the separator.
    pub fn validate(&self) -> Result<()> {
        for (name, server) in &self.mcp_servers {
            if name.is_empty() || name.contains(TOOL_NAME_SEPARATOR) {
                return Err(HostError::Configuration(format!(
                    "invalid server name '{name}': must be non-empty and must not contain '{TOOL_NAME_SEPARATOR}'"
                )));
            }
            if server.command.trim().is_empty() {
                return Err(HostError::Configuration(format!(
                    "server '{name}' has an empty command"
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.mcp_servers.is_empty()
    }
}
