//! Core logic including the agent loop, tool dispatch and conversation
//! history.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod model_client;
pub mod tool;

pub use agent::{Agent, AgentBuilder, AgentError, Turn};
pub use model_client::{ModelClient, ModelClientResponse, TranscriptFn};
pub use tool::Tool;
