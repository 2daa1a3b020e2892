//! Durable, keyed, append-only checkpoint store for Palaver threads.
//!
//! Each thread owns a singly-linked lineage of immutable checkpoints; the
//! store enforces that a new checkpoint's parent is the current head, which
//! keeps "latest state" and "replay from checkpoint N" well-defined.

pub mod fs;
pub mod memory;
pub mod store;
pub mod types;

pub use fs::FsCheckpointStore;
pub use memory::MemoryCheckpointStore;
pub use store::{CheckpointStore, CheckpointStoreError, CheckpointStoreResult};
pub use types::{Checkpoint, CheckpointId, ThreadId};
