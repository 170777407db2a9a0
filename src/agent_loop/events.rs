//! Turn event stream types.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Message, ToolCall, Usage};

use super::types::{TurnId, TurnState};

/// Concrete event payloads emitted by the turn runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEventPayload {
    StateChanged {
        state: TurnState,
    },
    UserPrompt {
        text: String,
    },
    AssistantMessage {
        message: Message,
    },
    ToolCallStarted {
        call: ToolCall,
    },
    /// The call was not executed and produced no result.
    ToolCallSkipped {
        call: ToolCall,
        reason: String,
    },
    ToolResult {
        call: ToolCall,
        message: Message,
        is_error: bool,
    },
    Completed {
        usage: Usage,
        model_calls: usize,
    },
    Cancelled,
    Failed {
        error: String,
    },
}

/// Envelope for turn events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEvent {
    pub turn_id: TurnId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: TurnEventPayload,
}

/// Callback used for observing turns.
pub type TurnEventSink = Arc<dyn Fn(TurnEvent) + Send + Sync>;

pub(crate) struct TurnEventEmitter {
    seq: AtomicU64,
    sink: Option<TurnEventSink>,
}

impl TurnEventEmitter {
    pub(crate) fn new(sink: Option<TurnEventSink>) -> Self {
        Self {
            seq: AtomicU64::new(1),
            sink,
        }
    }

    pub(crate) fn emit(&self, turn_id: TurnId, payload: TurnEventPayload) {
        let Some(sink) = &self.sink else { return; };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (sink)(TurnEvent {
            turn_id,
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }
}
