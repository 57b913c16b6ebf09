//! An out-of-the-box agent that assembles the built-in tools and a local
//! Ollama model.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring agent functionality into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod calc;
pub mod config;
pub mod image;
pub mod sandbox;
pub mod search;
mod session;
pub mod speech;
pub mod tools;

pub use config::Config;
pub use session::{Session, SessionBuilder, default_system_prompt};

/// Re-exports of [`sidekick_core`] crate.
pub mod core {
    pub use sidekick_core::*;
}
