use crate::store::{CheckpointStore, CheckpointStoreError, CheckpointStoreResult};
use crate::types::{Checkpoint, CheckpointId, ContentHash, ThreadId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct MemoryState {
    pub next_checkpoint_id: u64,
    pub heads: BTreeMap<ThreadId, CheckpointId>,
    pub checkpoints: BTreeMap<CheckpointId, Checkpoint>,
}

impl MemoryState {
    fn allocate_checkpoint_id(&mut self) -> CheckpointId {
        if self.next_checkpoint_id == 0 {
            self.next_checkpoint_id = 1;
        }
        let id = self.next_checkpoint_id;
        self.next_checkpoint_id += 1;
        id.to_string()
    }

    fn content_hash(payload: &[u8]) -> ContentHash {
        blake3::hash(payload).to_hex().to_string()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryCheckpointStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: MemoryState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub(crate) fn snapshot(&self) -> CheckpointStoreResult<MemoryState> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| {
                CheckpointStoreError::Backend("memory checkpoint mutex poisoned".to_string())
            })?
            .clone())
    }
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn put(
        &self,
        thread_id: &ThreadId,
        parent_checkpoint_id: Option<CheckpointId>,
        payload: Vec<u8>,
    ) -> CheckpointStoreResult<Checkpoint> {
        let mut state = self.inner.lock().map_err(|_| {
            CheckpointStoreError::Backend("memory checkpoint mutex poisoned".to_string())
        })?;

        let head = state.heads.get(thread_id).cloned();
        if parent_checkpoint_id != head {
            return Err(CheckpointStoreError::Conflict(format!(
                "parent {:?} is not the head {:?} of thread {}",
                parent_checkpoint_id, head, thread_id
            )));
        }

        let checkpoint_id = state.allocate_checkpoint_id();
        let checkpoint = Checkpoint {
            thread_id: thread_id.clone(),
            checkpoint_id: checkpoint_id.clone(),
            parent_checkpoint_id,
            content_hash: MemoryState::content_hash(&payload),
            payload,
        };

        state
            .checkpoints
            .insert(checkpoint_id.clone(), checkpoint.clone());
        state.heads.insert(thread_id.clone(), checkpoint_id);

        Ok(checkpoint)
    }

    async fn get_latest(&self, thread_id: &ThreadId) -> CheckpointStoreResult<Option<Checkpoint>> {
        let state = self.inner.lock().map_err(|_| {
            CheckpointStoreError::Backend("memory checkpoint mutex poisoned".to_string())
        })?;

        let Some(head) = state.heads.get(thread_id) else {
            return Ok(None);
        };
        state
            .checkpoints
            .get(head)
            .cloned()
            .map(Some)
            .ok_or_else(|| CheckpointStoreError::NotFound {
                resource: "checkpoint",
                id: head.clone(),
            })
    }

    async fn list(&self, thread_id: &ThreadId) -> CheckpointStoreResult<Vec<Checkpoint>> {
        let state = self.inner.lock().map_err(|_| {
            CheckpointStoreError::Backend("memory checkpoint mutex poisoned".to_string())
        })?;

        let Some(head) = state.heads.get(thread_id) else {
            return Ok(Vec::new());
        };

        let mut lineage = Vec::new();
        let mut cursor = Some(head.clone());
        while let Some(checkpoint_id) = cursor {
            let checkpoint = state.checkpoints.get(&checkpoint_id).ok_or_else(|| {
                CheckpointStoreError::NotFound {
                    resource: "checkpoint",
                    id: checkpoint_id.clone(),
                }
            })?;
            lineage.push(checkpoint.clone());
            cursor = checkpoint.parent_checkpoint_id.clone();
        }
        lineage.reverse();
        Ok(lineage)
    }

    async fn delete(&self, thread_id: &ThreadId) -> CheckpointStoreResult<bool> {
        let mut state = self.inner.lock().map_err(|_| {
            CheckpointStoreError::Backend("memory checkpoint mutex poisoned".to_string())
        })?;

        let removed_head = state.heads.remove(thread_id).is_some();
        state
            .checkpoints
            .retain(|_, checkpoint| checkpoint.thread_id != *thread_id);
        Ok(removed_head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn put_chain_forms_parent_lineage() {
        let store = MemoryCheckpointStore::new();
        let thread = "t1".to_string();

        let first = store
            .put(&thread, None, b"one".to_vec())
            .await
            .expect("first put should succeed");
        let second = store
            .put(&thread, Some(first.checkpoint_id.clone()), b"two".to_vec())
            .await
            .expect("second put should succeed");

        assert_eq!(first.parent_checkpoint_id, None);
        assert_eq!(
            second.parent_checkpoint_id.as_deref(),
            Some(first.checkpoint_id.as_str())
        );

        let lineage = store.list(&thread).await.expect("list should succeed");
        assert_eq!(lineage.len(), 2);
        assert_eq!(lineage[0].checkpoint_id, first.checkpoint_id);
        assert_eq!(lineage[1].checkpoint_id, second.checkpoint_id);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn put_with_stale_parent_is_rejected() {
        let store = MemoryCheckpointStore::new();
        let thread = "t1".to_string();

        let first = store
            .put(&thread, None, b"one".to_vec())
            .await
            .expect("first put should succeed");
        store
            .put(&thread, Some(first.checkpoint_id.clone()), b"two".to_vec())
            .await
            .expect("second put should succeed");

        let error = store
            .put(&thread, Some(first.checkpoint_id), b"stale".to_vec())
            .await
            .expect_err("stale parent should be rejected");
        assert!(matches!(error, CheckpointStoreError::Conflict(_)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn first_put_must_not_carry_parent() {
        let store = MemoryCheckpointStore::new();
        let error = store
            .put(&"t1".to_string(), Some("7".to_string()), b"x".to_vec())
            .await
            .expect_err("unseen thread with parent should be rejected");
        assert!(matches!(error, CheckpointStoreError::Conflict(_)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn delete_removes_all_thread_checkpoints() {
        let store = MemoryCheckpointStore::new();
        let thread = "t1".to_string();
        let other = "t2".to_string();

        let first = store
            .put(&thread, None, b"one".to_vec())
            .await
            .expect("put should succeed");
        store
            .put(&thread, Some(first.checkpoint_id), b"two".to_vec())
            .await
            .expect("put should succeed");
        store
            .put(&other, None, b"other".to_vec())
            .await
            .expect("put should succeed");

        assert!(store.delete(&thread).await.expect("delete should succeed"));
        assert!(!store.delete(&thread).await.expect("delete should succeed"));
        assert!(
            store
                .get_latest(&thread)
                .await
                .expect("get_latest should succeed")
                .is_none()
        );
        assert!(
            store
                .get_latest(&other)
                .await
                .expect("get_latest should succeed")
                .is_some()
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn distinct_threads_have_independent_lineages() {
        let store = MemoryCheckpointStore::new();
        let a = "a".to_string();
        let b = "b".to_string();

        store
            .put(&a, None, b"a1".to_vec())
            .await
            .expect("put should succeed");
        store
            .put(&b, None, b"b1".to_vec())
            .await
            .expect("put should succeed");

        let latest_a = store
            .get_latest(&a)
            .await
            .expect("get_latest should succeed")
            .expect("thread a should have a head");
        assert_eq!(latest_a.payload, b"a1".to_vec());
        assert_eq!(latest_a.parent_checkpoint_id, None);
    }
}
