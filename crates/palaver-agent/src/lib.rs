//! Agent execution graph for Palaver.
//!
//! Drives the assistant/tool loop for one durable conversation thread:
//! alternating `Assistant` and `ToolDispatch` steps, a checkpoint write after
//! every step, context-window trimming, ordered stream-event delivery with
//! cooperative cancellation, and fire-and-forget usage accounting.

pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod snapshot;
pub mod structured;
pub mod tools;
pub mod usage;
pub mod window;

pub use config::*;
pub use engine::*;
pub use errors::*;
pub use events::*;
pub use snapshot::*;
pub use structured::*;
pub use tools::*;
pub use usage::*;
pub use window::*;
