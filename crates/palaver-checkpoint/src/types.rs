use serde::{Deserialize, Serialize};

pub type ThreadId = String;
pub type CheckpointId = String;
pub type ContentHash = String;

/// An immutable snapshot of a thread's state after one execution step.
///
/// Invariant: every checkpoint for a thread except the first has exactly one
/// parent, and the parent belongs to the same thread. The payload is opaque
/// to the store; the execution graph serializes its own snapshot into it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: ThreadId,
    pub checkpoint_id: CheckpointId,
    pub parent_checkpoint_id: Option<CheckpointId>,
    pub payload: Vec<u8>,
    pub content_hash: ContentHash,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_round_trip_is_lossless() {
        let checkpoint = Checkpoint {
            thread_id: "t1".to_string(),
            checkpoint_id: "2".to_string(),
            parent_checkpoint_id: Some("1".to_string()),
            payload: b"{\"messages\":[]}".to_vec(),
            content_hash: blake3::hash(b"{\"messages\":[]}").to_hex().to_string(),
        };

        let encoded = serde_json::to_vec(&checkpoint).expect("checkpoint should serialize");
        let decoded: Checkpoint =
            serde_json::from_slice(&encoded).expect("checkpoint should deserialize");
        assert_eq!(decoded, checkpoint);
    }
}
