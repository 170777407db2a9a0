//! Shared test helpers: a scripted provider and in-process collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use toolhost::agent_loop::{TurnEvent, TurnEventSink};
use toolhost::error::HostError;
use toolhost::provider::format::{render_tool_content, tool_response_message};
use toolhost::provider::ModelProvider;
use toolhost::tools::{
    FunctionCollaborator, ToolArguments, ToolCollaborator, ToolDefinition, ToolInputSchema,
};
use toolhost::types::*;

/// One scripted reaction to `create_message`.
pub enum Step {
    Reply(Message),
    Fail(HostError),
    /// Never resolves; used to exercise cancellation.
    Hang,
}

/// What the provider was asked for on one call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

/// A provider that plays back queued steps and records every request.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    supports_tools: bool,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
            supports_tools: true,
        }
    }

    pub fn without_tool_support(mut self) -> Self {
        self.supports_tools = false;
        self
    }

    /// Handle to the request log that survives boxing the provider.
    pub fn requests(&self) -> Arc<Mutex<Vec<RecordedRequest>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn supports_tools(&self) -> bool {
        self.supports_tools
    }

    async fn create_message(
        &self,
        prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message, HostError> {
        let mut messages = messages.to_vec();
        if !prompt.is_empty() {
            messages.push(Message::user(prompt));
        }
        self.requests.lock().unwrap().push(RecordedRequest {
            messages,
            tools: tools.to_vec(),
        });

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(message)) => Ok(message),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Hang) => std::future::pending().await,
            None => Ok(assistant_text("script exhausted")),
        }
    }

    fn create_tool_response(
        &self,
        tool_call_id: &str,
        content: ToolContent,
    ) -> Result<Message, HostError> {
        let rendered = render_tool_content(&content)?;
        Ok(tool_response_message(tool_call_id, &content, rendered))
    }
}

pub fn assistant_text(text: &str) -> Message {
    Message::assistant(text).with_usage(Usage::new(10, 20))
}

/// An assistant reply requesting the given `(id, name, input)` calls.
pub fn assistant_calls(calls: &[(&str, &str, Value)]) -> Message {
    let content = calls
        .iter()
        .map(|(id, name, input)| ContentBlock::tool_use(*id, *name, input.clone()))
        .collect();
    Message::new(Role::Assistant, content).with_usage(Usage::new(10, 5))
}

/// `util__echo`, `util__fail` and `util__slow` (sleeps ten minutes).
pub fn util_collaborator() -> FunctionCollaborator {
    FunctionCollaborator::new("util")
        .with_tool(
            "echo",
            "Echo the input",
            ToolInputSchema::object().string("text", "Text to echo", true).build(),
            |args| async move { Ok(ToolContent::Text(args.get_str("text")?.to_string())) },
        )
        .with_tool(
            "fail",
            "Always fails",
            ToolInputSchema::default(),
            |_| async move {
                Err(HostError::ToolExecution {
                    tool_name: "fail".into(),
                    message: "disk on fire".into(),
                })
            },
        )
        .with_tool(
            "slow",
            "Takes a long time",
            ToolInputSchema::default(),
            |_| async move {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok(ToolContent::Json(json!({"done": true})))
            },
        )
}

/// Collaborator that counts calls and closes, answering every tool with "ok".
#[derive(Default)]
pub struct CountingCollaborator {
    pub calls: AtomicUsize,
    pub closes: AtomicUsize,
}

#[async_trait]
impl ToolCollaborator for CountingCollaborator {
    fn name(&self) -> &str {
        "counter"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, HostError> {
        Ok(vec![ToolDefinition::new("tick", "Count a call", ToolInputSchema::default())])
    }

    async fn call_tool(
        &self,
        _tool_name: &str,
        _args: &ToolArguments,
    ) -> Result<ToolContent, HostError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ToolContent::Text("ok".into()))
    }

    async fn close(&self) -> Result<(), HostError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Event sink that stores everything it receives.
pub fn recording_sink() -> (TurnEventSink, Arc<Mutex<Vec<TurnEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&events);
    let sink: TurnEventSink = Arc::new(move |event| captured.lock().unwrap().push(event));
    (sink, events)
}
