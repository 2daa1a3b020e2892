use crate::memory::{MemoryCheckpointStore, MemoryState};
use crate::store::{CheckpointStore, CheckpointStoreError, CheckpointStoreResult};
use crate::types::{Checkpoint, CheckpointId, ThreadId};
use std::fs;
use std::path::{Path, PathBuf};

const STATE_FILE_NAME: &str = "checkpoint-state.json";

/// File-backed checkpoint store. Keeps the full state in memory and rewrites
/// it atomically (tmp file + rename) after every mutation, so a reopened
/// store always sees the last fully-written state.
#[derive(Clone, Debug)]
pub struct FsCheckpointStore {
    state_file: PathBuf,
    inner: MemoryCheckpointStore,
}

impl FsCheckpointStore {
    pub fn new<P: AsRef<Path>>(root: P) -> CheckpointStoreResult<Self> {
        fs::create_dir_all(root.as_ref()).map_err(|err| {
            CheckpointStoreError::Backend(format!("create fs store root failed: {err}"))
        })?;
        let state_file = root.as_ref().join(STATE_FILE_NAME);
        let state = if state_file.exists() {
            let raw = fs::read(&state_file).map_err(|err| {
                CheckpointStoreError::Backend(format!("read state file failed: {err}"))
            })?;
            serde_json::from_slice::<MemoryState>(&raw)
                .map_err(|err| CheckpointStoreError::Serialization(err.to_string()))?
        } else {
            MemoryState::default()
        };

        Ok(Self {
            state_file,
            inner: MemoryCheckpointStore::from_state(state),
        })
    }

    fn persist(&self) -> CheckpointStoreResult<()> {
        let snapshot = self.inner.snapshot()?;
        let raw = serde_json::to_vec_pretty(&snapshot)
            .map_err(|err| CheckpointStoreError::Serialization(err.to_string()))?;
        let tmp = self.state_file.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|err| {
            CheckpointStoreError::Backend(format!("write state file failed: {err}"))
        })?;
        fs::rename(&tmp, &self.state_file).map_err(|err| {
            CheckpointStoreError::Backend(format!("rename state file failed: {err}"))
        })?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CheckpointStore for FsCheckpointStore {
    async fn put(
        &self,
        thread_id: &ThreadId,
        parent_checkpoint_id: Option<CheckpointId>,
        payload: Vec<u8>,
    ) -> CheckpointStoreResult<Checkpoint> {
        let checkpoint = self.inner.put(thread_id, parent_checkpoint_id, payload).await?;
        self.persist()?;
        Ok(checkpoint)
    }

    async fn get_latest(&self, thread_id: &ThreadId) -> CheckpointStoreResult<Option<Checkpoint>> {
        self.inner.get_latest(thread_id).await
    }

    async fn list(&self, thread_id: &ThreadId) -> CheckpointStoreResult<Vec<Checkpoint>> {
        self.inner.list(thread_id).await
    }

    async fn delete(&self, thread_id: &ThreadId) -> CheckpointStoreResult<bool> {
        let deleted = self.inner.delete(thread_id).await?;
        if deleted {
            self.persist()?;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn reopen_restores_previous_head() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let store = FsCheckpointStore::new(tmp.path()).expect("fs store should initialize");
        let thread = "t1".to_string();

        let first = store
            .put(&thread, None, b"one".to_vec())
            .await
            .expect("put should succeed");
        let second = store
            .put(&thread, Some(first.checkpoint_id), b"two".to_vec())
            .await
            .expect("put should succeed");
        drop(store);

        let reopened = FsCheckpointStore::new(tmp.path()).expect("fs store should reopen");
        let latest = reopened
            .get_latest(&thread)
            .await
            .expect("get_latest should succeed")
            .expect("head should survive reopen");
        assert_eq!(latest.checkpoint_id, second.checkpoint_id);
        assert_eq!(latest.payload, b"two".to_vec());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn delete_survives_reopen() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let store = FsCheckpointStore::new(tmp.path()).expect("fs store should initialize");
        let thread = "t1".to_string();

        store
            .put(&thread, None, b"one".to_vec())
            .await
            .expect("put should succeed");
        assert!(store.delete(&thread).await.expect("delete should succeed"));
        drop(store);

        let reopened = FsCheckpointStore::new(tmp.path()).expect("fs store should reopen");
        assert!(
            reopened
                .get_latest(&thread)
                .await
                .expect("get_latest should succeed")
                .is_none()
        );
    }
}
