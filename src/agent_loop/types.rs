//! Core turn types.

use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::types::{Message, Usage};

/// Unique turn identifier.
pub type TurnId = Uuid;

/// Where the runner currently is within a turn.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnState {
    /// Waiting for a prompt.
    #[default]
    Idle,
    /// A model request (including overload retries) is outstanding.
    AwaitingModel,
    /// Running the tool calls of the latest assistant message.
    DispatchingTools,
}

/// Result of a completed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub turn_id: TurnId,
    /// The assistant message that ended the turn (no tool calls left to run).
    pub final_message: Message,
    /// Number of model round-trips taken.
    pub model_calls: usize,
    /// Usage summed over every round-trip.
    pub usage: Usage,
}
