use thiserror::Error;

/// Top-level error type for the palaver-agent crate.
///
/// Model and checkpoint failures are fatal to the current run; tool failures
/// and usage-recording failures are recovered locally and never surface here.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("recursion limit of {limit} steps exceeded")]
    RecursionLimitExceeded { limit: usize },
    #[error("tool execution failed: {0}")]
    Tool(String),
    #[error("snapshot serialization failed: {0}")]
    Snapshot(String),
    #[error("run task failed: {0}")]
    Join(String),
    #[error(transparent)]
    Model(#[from] palaver_llm::LlmError),
    #[error(transparent)]
    Checkpoint(#[from] palaver_checkpoint::CheckpointStoreError),
}
