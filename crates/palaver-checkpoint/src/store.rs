use crate::types::{Checkpoint, CheckpointId, ThreadId};

#[derive(Debug, thiserror::Error)]
pub enum CheckpointStoreError {
    #[error("resource not found: {resource} ({id})")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

pub type CheckpointStoreResult<T> = Result<T, CheckpointStoreError>;

/// Contract consumed by the execution graph. Callers must keep at most one
/// in-flight write per thread; the store enforces the lineage invariant by
/// rejecting writes whose parent is not the current head.
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Durably appends a checkpoint for the thread and returns it. The first
    /// checkpoint of a thread must carry no parent; every later one must name
    /// the current head as its parent.
    async fn put(
        &self,
        thread_id: &ThreadId,
        parent_checkpoint_id: Option<CheckpointId>,
        payload: Vec<u8>,
    ) -> CheckpointStoreResult<Checkpoint>;

    /// Most recently committed checkpoint, or `None` for an unseen thread.
    async fn get_latest(&self, thread_id: &ThreadId) -> CheckpointStoreResult<Option<Checkpoint>>;

    /// Full lineage for the thread, oldest first.
    async fn list(&self, thread_id: &ThreadId) -> CheckpointStoreResult<Vec<Checkpoint>>;

    /// Removes every checkpoint for the thread; returns whether anything was
    /// deleted.
    async fn delete(&self, thread_id: &ThreadId) -> CheckpointStoreResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_error_carries_metadata() {
        let error = CheckpointStoreError::NotFound {
            resource: "thread",
            id: "t1".to_string(),
        };

        assert_eq!(error.to_string(), "resource not found: thread (t1)");
    }
}
