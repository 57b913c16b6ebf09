//! Provider-neutral protocol between the agent and a chat model.
//!
//! The agent only ever talks to a model through the types in this crate:
//! it builds a [`ModelRequest`] from the conversation and the advertised
//! tools, and reads a [`ModelResponse`] as a stream of events. Any chat
//! backend with a tool-calling convention can sit behind [`ModelProvider`].
//!
//! Types in this crate carry no behavior of their own, they are the contract
//! that provider implementations must follow.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
