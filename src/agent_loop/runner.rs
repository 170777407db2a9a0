//! The turn runner: model round-trips with tool dispatch in between.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::HostSettings;
use crate::error::{HostError, Result};
use crate::history::History;
use crate::provider::ModelProvider;
use crate::tools::{CollaboratorRegistry, ToolArguments, ToolDefinition};
use crate::types::{ContentBlock, Message, ToolCall, ToolContent, Usage};
use crate::util::timeout::with_timeout;

use super::events::{TurnEventEmitter, TurnEventPayload, TurnEventSink};
use super::types::{TurnId, TurnOutcome, TurnState};

/// What became of a single tool call.
enum Dispatch {
    Answered(Message),
    Skipped,
    Cancelled,
}

/// Drives one conversation against a provider and a set of tool collaborators.
///
/// A turn starts with a user prompt and keeps asking the model for a reply,
/// running whatever tools it requests and feeding the results back, until a
/// reply arrives without tool calls. History is owned here and outlives
/// individual turns.
pub struct TurnRunner {
    provider: Box<dyn ModelProvider>,
    registry: Arc<CollaboratorRegistry>,
    tools: Vec<ToolDefinition>,
    settings: HostSettings,
    history: History,
    emitter: TurnEventEmitter,
    state: TurnState,
}

impl TurnRunner {
    pub fn new(
        provider: Box<dyn ModelProvider>,
        registry: Arc<CollaboratorRegistry>,
        tools: Vec<ToolDefinition>,
        settings: HostSettings,
    ) -> Self {
        Self {
            provider,
            registry,
            tools,
            settings,
            history: History::new(),
            emitter: TurnEventEmitter::new(None),
            state: TurnState::Idle,
        }
    }

    /// Build a runner advertising every tool the registry's collaborators list.
    pub async fn from_registry(
        provider: Box<dyn ModelProvider>,
        registry: Arc<CollaboratorRegistry>,
        settings: HostSettings,
    ) -> Self {
        let tools = registry.tool_definitions(settings.tool_timeout).await;
        info!(
            provider = provider.name(),
            model = provider.model_id(),
            tools = tools.len(),
            "Turn runner ready"
        );
        Self::new(provider, registry, tools, settings)
    }

    pub fn with_event_sink(mut self, sink: TurnEventSink) -> Self {
        self.emitter = TurnEventEmitter::new(Some(sink));
        self
    }

    pub fn provider(&self) -> &dyn ModelProvider {
        self.provider.as_ref()
    }

    pub fn registry(&self) -> &CollaboratorRegistry {
        &self.registry
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Run one turn to completion.
    ///
    /// Cancelling `cancel` abandons the outstanding model request or tool
    /// call and rolls history back to the start of the interrupted
    /// round-trip; the prompt itself stays in history.
    pub async fn run_turn(&mut self, prompt: &str, cancel: &CancellationToken) -> Result<TurnOutcome> {
        let turn_id = Uuid::new_v4();
        let result = self.drive(turn_id, prompt, cancel).await;
        self.set_state(turn_id, TurnState::Idle);

        let payload = match &result {
            Ok(outcome) => TurnEventPayload::Completed {
                usage: outcome.usage,
                model_calls: outcome.model_calls,
            },
            Err(HostError::Cancelled) => TurnEventPayload::Cancelled,
            Err(e) => TurnEventPayload::Failed {
                error: e.to_string(),
            },
        };
        self.emitter.emit(turn_id, payload);
        result
    }

    async fn drive(
        &mut self,
        turn_id: TurnId,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let advertise_tools = !self.tools.is_empty() && self.provider.supports_tools().await;
        if !self.tools.is_empty() && !advertise_tools {
            warn!(model = self.provider.model_id(), "Model does not support tools; sending none");
        }

        if !prompt.is_empty() {
            self.history.add_user_message(prompt);
            self.emitter.emit(
                turn_id,
                TurnEventPayload::UserPrompt {
                    text: prompt.to_string(),
                },
            );
        }

        let mut model_calls = 0;
        let mut usage = Usage::default();

        loop {
            if let Some(max) = self.settings.max_turns {
                if model_calls >= max {
                    warn!(max_turns = max, "Turn hit round-trip cap");
                    return Err(HostError::MaxTurnsExceeded(max));
                }
            }

            self.history.prune(self.settings.message_window);
            let checkpoint = self.history.len();
            self.set_state(turn_id, TurnState::AwaitingModel);

            let request = self.request_messages();
            let tools: &[ToolDefinition] = if advertise_tools { &self.tools } else { &[] };
            let provider = self.provider.as_ref();
            let retry = &self.settings.retry;

            debug!(messages = request.len(), tools = tools.len(), "Requesting model reply");
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = retry.execute(|| provider.create_message("", &request, tools)) => Some(r),
            };
            let Some(response) = response else {
                info!("Turn cancelled while awaiting model");
                return Err(HostError::Cancelled);
            };
            let assistant = response?;

            model_calls += 1;
            usage.merge(&assistant.usage);
            self.history.push(assistant.clone());
            self.emitter.emit(
                turn_id,
                TurnEventPayload::AssistantMessage {
                    message: assistant.clone(),
                },
            );

            let calls = assistant.tool_calls();
            if calls.is_empty() {
                info!(
                    model_calls,
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "Turn complete"
                );
                return Ok(TurnOutcome {
                    turn_id,
                    final_message: assistant,
                    model_calls,
                    usage,
                });
            }

            self.set_state(turn_id, TurnState::DispatchingTools);
            let mut answered = 0;
            let mut skipped = HashSet::new();
            for call in &calls {
                match self.dispatch(turn_id, call, cancel).await {
                    Dispatch::Answered(message) => {
                        self.history.push(message);
                        answered += 1;
                    }
                    Dispatch::Skipped => {
                        skipped.insert(call.id.clone());
                    }
                    Dispatch::Cancelled => {
                        info!(tool = %call.name, "Turn cancelled during tool call");
                        self.history.truncate(checkpoint);
                        return Err(HostError::Cancelled);
                    }
                }
            }
            self.history.discard_tool_uses(&skipped);

            if answered == 0 {
                info!(skipped = skipped.len(), "No tool results to report, ending turn");
                let mut final_message = assistant;
                final_message.remove_tool_uses(&skipped);
                return Ok(TurnOutcome {
                    turn_id,
                    final_message,
                    model_calls,
                    usage,
                });
            }
        }
    }

    /// Execute one call, turning any failure into an error result.
    async fn dispatch(&self, turn_id: TurnId, call: &ToolCall, cancel: &CancellationToken) -> Dispatch {
        info!(tool = %call.name, "Using tool");

        let (collaborator, tool_name) = match self.registry.resolve(&call.name) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Skipping tool call");
                self.emitter.emit(
                    turn_id,
                    TurnEventPayload::ToolCallSkipped {
                        call: call.clone(),
                        reason: e.to_string(),
                    },
                );
                return Dispatch::Skipped;
            }
        };

        self.emitter.emit(turn_id, TurnEventPayload::ToolCallStarted { call: call.clone() });

        let outcome = match call.parse_arguments() {
            Ok(args) => {
                let args = ToolArguments::new(args);
                let invocation = with_timeout(
                    self.settings.tool_timeout,
                    collaborator.call_tool(&tool_name, &args),
                );
                let finished = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    r = invocation => Some(r),
                };
                match finished {
                    Some(r) => r,
                    None => return Dispatch::Cancelled,
                }
            }
            Err(e) => Err(e),
        };

        let message = match outcome {
            Ok(content) => self.provider.create_tool_response(&call.id, content),
            Err(e) => {
                error!(tool = %tool_name, error = %e, "Tool call failed");
                let text = format!("Error calling tool {tool_name}: {e}");
                self.provider
                    .create_tool_response(&call.id, ToolContent::Text(text))
                    .map(Message::into_error)
            }
        };
        let message = message.unwrap_or_else(|e| {
            error!(tool = %tool_name, error = %e, "Failed to build tool result");
            let text = format!("Error calling tool {tool_name}: {e}");
            Message::tool_result(&call.id, Value::String(text.clone()), text, true)
        });

        let is_error = message
            .content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolResult { is_error: true, .. }));
        self.emitter.emit(
            turn_id,
            TurnEventPayload::ToolResult {
                call: call.clone(),
                message: message.clone(),
                is_error,
            },
        );
        Dispatch::Answered(message)
    }

    /// History as sent to the provider, behind the system prompt if any.
    fn request_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        if let Some(system) = self.settings.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            messages.push(Message::system(system));
        }
        messages.extend(self.history.messages().iter().cloned());
        messages
    }

    fn set_state(&mut self, turn_id: TurnId, state: TurnState) {
        if self.state != state {
            self.state = state;
            self.emitter.emit(turn_id, TurnEventPayload::StateChanged { state });
        }
    }
}
