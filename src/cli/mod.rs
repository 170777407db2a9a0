//! Command-line surface for the interactive host.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::agent_loop::events::{TurnEvent, TurnEventPayload};
use crate::config::{Credentials, HostSettings, McpConfig, ProviderKind, DEFAULT_TOOL_TIMEOUT};
use crate::history::DEFAULT_MESSAGE_WINDOW;
use crate::tools::ToolDefinition;
use crate::types::Message;

/// Longest tool output echoed to the terminal.
const MAX_DISPLAY_CHARS: usize = 200;

/// Chat with a model that can call tools on local MCP servers.
#[derive(Parser, Debug)]
#[command(name = "toolhost", version, about = "Tool-calling chat host for MCP servers")]
pub struct Cli {
    /// Tool server config file (default: ~/.mcp.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Messages kept in context before each model request
    #[arg(long, default_value_t = DEFAULT_MESSAGE_WINDOW)]
    pub message_window: usize,

    /// Model backend: anthropic, openai, azure or ollama
    #[arg(long, default_value_t = ProviderKind::Anthropic)]
    pub provider: ProviderKind,

    /// Model id (defaults per provider)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Cap on model round-trips per turn
    #[arg(long)]
    pub max_turns: Option<usize>,

    /// Per-call tool timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TOOL_TIMEOUT.as_secs())]
    pub tool_timeout_secs: u64,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Settings for the turn runner, with credentials from the environment.
    pub fn settings(&self, credentials: Credentials) -> HostSettings {
        HostSettings::builder()
            .provider(self.provider)
            .maybe_model(self.model.clone())
            .message_window(self.message_window)
            .tool_timeout(Duration::from_secs(self.tool_timeout_secs))
            .maybe_max_turns(self.max_turns)
            .maybe_temperature(self.temperature)
            .maybe_system_prompt(self.system.clone())
            .credentials(credentials)
            .build()
    }

    /// Default filter directive for the log subscriber.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "warn"
        }
    }
}

/// Commands typed at the prompt instead of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Tools,
    Servers,
    History,
    Clear,
    Quit,
}

impl SlashCommand {
    /// `None` for ordinary prompts; unknown commands are an error.
    pub fn parse(line: &str) -> Option<Result<Self, String>> {
        let line = line.trim();
        if !line.starts_with('/') {
            return None;
        }
        let command = match line.to_lowercase().as_str() {
            "/help" => Self::Help,
            "/tools" => Self::Tools,
            "/servers" => Self::Servers,
            "/history" => Self::History,
            "/clear" => Self::Clear,
            "/quit" | "/exit" => Self::Quit,
            _ => return Some(Err(format!("Unknown command: {line}. Type /help for commands."))),
        };
        Some(Ok(command))
    }
}

pub const HELP_TEXT: &str = "\
Available commands:
  /help     Show this help
  /tools    List tools by server
  /servers  List configured servers
  /history  Show conversation history
  /clear    Clear conversation history
  /quit     Exit

Press Ctrl+C to cancel a running turn.";

/// `/tools`: namespaced tools grouped by their server prefix.
pub fn render_tools(tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        return "No tools available.".into();
    }
    let mut out = String::from("Available tools:");
    let mut current = "";
    for tool in tools {
        let (server, name) = tool.name.split_once("__").unwrap_or(("", tool.name.as_str()));
        if server != current {
            out.push_str(&format!("\n  {server}"));
            current = server;
        }
        out.push_str(&format!("\n    • {name}: {}", tool.description));
    }
    out
}

/// `/servers`: configured servers with their launch command.
pub fn render_servers(config: &McpConfig) -> String {
    if config.is_empty() {
        return "No servers configured.".into();
    }
    let mut out = String::from("Configured servers:");
    for (name, server) in &config.mcp_servers {
        out.push_str(&format!("\n  {name}\n    command: {}", server.command));
        if !server.args.is_empty() {
            out.push_str(&format!("\n    args: {}", server.args.join(" ")));
        }
    }
    out
}

/// `/history`: role and text of each retained message.
pub fn render_history(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "History is empty.".into();
    }
    messages
        .iter()
        .map(|m| {
            let text = if m.is_tool_response() {
                m.tool_result_text()
            } else {
                m.text()
            };
            let calls = m.tool_calls();
            if calls.is_empty() {
                format!("{}: {}", m.role, truncate_for_display(&text))
            } else {
                let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
                format!("{}: {} [tools: {}]", m.role, text, names.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Terminal line for a turn event, if it deserves one.
pub fn render_event(event: &TurnEvent) -> Option<String> {
    match &event.payload {
        TurnEventPayload::AssistantMessage { message } => {
            let text = message.text();
            (!text.is_empty()).then(|| format!("Assistant: {text}"))
        }
        TurnEventPayload::ToolCallStarted { call } => Some(format!("🔧 Using tool: {}", call.name)),
        TurnEventPayload::ToolCallSkipped { call, reason } => {
            Some(format!("⚠️  Skipped {}: {reason}", call.name))
        }
        TurnEventPayload::ToolResult {
            message,
            is_error: true,
            ..
        } => Some(format!("❌ {}", truncate_for_display(&message.tool_result_text()))),
        TurnEventPayload::Failed { error } => Some(format!("❌ {error}")),
        TurnEventPayload::Cancelled => Some("Turn cancelled.".into()),
        _ => None,
    }
}

fn truncate_for_display(text: &str) -> String {
    if text.len() <= MAX_DISPLAY_CHARS {
        return text.to_string();
    }
    // Find a valid UTF-8 char boundary at or before the limit
    let mut end = MAX_DISPLAY_CHARS;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
