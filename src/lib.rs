//! Toolhost: a tool-calling conversation host
//!
//! Lets a conversational agent backed by any of several interchangeable
//! providers (Anthropic, OpenAI, Azure OpenAI, Ollama) call external tools
//! mid-conversation and fold the results back into the dialogue until the
//! model produces a final answer.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use toolhost::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> toolhost::error::Result<()> {
//! let settings = HostSettings::builder()
//!     .provider(ProviderKind::Anthropic)
//!     .credentials(Credentials::from_env())
//!     .build();
//! let provider = toolhost::provider::create_provider(&settings)?;
//! let registry = Arc::new(CollaboratorRegistry::new());
//!
//! let mut runner = TurnRunner::from_registry(provider, registry, settings).await;
//! let outcome = runner.run_turn("Hello!", &CancellationToken::new()).await?;
//! println!("{}", outcome.final_message.text());
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod error;
pub mod history;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "mcp")]
pub mod mcp;

#[cfg(feature = "cli")]
pub mod cli;
