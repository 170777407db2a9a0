//! Turn orchestration: the model/tool round-trip loop and its events.

pub mod events;
pub mod runner;
pub mod types;

pub use events::*;
pub use runner::*;
pub use types::*;
