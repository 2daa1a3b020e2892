//! Model invocation port for Palaver.
//!
//! Defines the role-tagged message model shared by the execution graph and
//! the checkpoint payloads, the `ChatModel` trait the graph calls into, and
//! an OpenAI-compatible HTTP adapter.

pub mod errors;
pub mod message;
pub mod model;
pub mod openai;

pub use errors::*;
pub use message::*;
pub use model::*;
pub use openai::*;
