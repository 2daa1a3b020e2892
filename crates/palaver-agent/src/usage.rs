use crate::config::AgentConfig;
use async_trait::async_trait;
use palaver_llm::{AiMessage, current_timestamp};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    /// The assistant message requested one or more tools.
    ToolCall,
    /// The assistant message was a plain response.
    Response,
}

/// One row of token accounting per completed model invocation step. Written
/// once, never updated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub thread_id: String,
    pub user_id: Option<String>,
    pub agent_type: String,
    pub model_name: String,
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub kind: UsageKind,
    pub message_id: String,
    pub recorded_at: String,
}

#[derive(Debug, thiserror::Error)]
pub enum UsageStoreError {
    #[error("usage backend failure: {0}")]
    Backend(String),
}

/// External usage store. Best-effort: the engine records asynchronously and
/// swallows failures, so implementations need no cross-run locking.
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn record(&self, record: UsageRecord) -> Result<(), UsageStoreError>;
}

#[derive(Clone, Default)]
pub struct MemoryUsageStore {
    records: Arc<Mutex<Vec<UsageRecord>>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<UsageRecord> {
        self.records
            .lock()
            .expect("memory usage store mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn record(&self, record: UsageRecord) -> Result<(), UsageStoreError> {
        self.records
            .lock()
            .map_err(|_| UsageStoreError::Backend("memory usage store mutex poisoned".to_string()))?
            .push(record);
        Ok(())
    }
}

/// Builds the usage record for one assistant step, or `None` when the
/// provider reported no usage metadata.
pub fn build_usage_record(
    config: &AgentConfig,
    thread_id: &str,
    message: &AiMessage,
) -> Option<UsageRecord> {
    let usage = message.metadata.usage?;
    let kind = if message.has_tool_calls() {
        UsageKind::ToolCall
    } else {
        UsageKind::Response
    };
    Some(UsageRecord {
        thread_id: thread_id.to_string(),
        user_id: config.user_id.clone(),
        agent_type: config.agent_type.clone(),
        model_name: message
            .metadata
            .model_name
            .clone()
            .unwrap_or_else(|| config.model_name.clone()),
        total_tokens: usage.total_tokens,
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        kind,
        message_id: message.id.clone(),
        recorded_at: current_timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_llm::{ResponseMetadata, ToolCall, Usage};
    use serde_json::json;

    fn config() -> AgentConfig {
        AgentConfig {
            model_name: "fallback-model".to_string(),
            user_id: Some("u1".to_string()),
            ..AgentConfig::default()
        }
    }

    fn ai_message(tool_calls: Vec<ToolCall>, metadata: ResponseMetadata) -> AiMessage {
        AiMessage::new("content", tool_calls, metadata, "0".to_string())
    }

    #[test]
    fn record_tags_tool_call_when_tools_requested() {
        let message = ai_message(
            vec![ToolCall {
                id: "c1".to_string(),
                name: "content_search".to_string(),
                arguments: json!({}),
            }],
            ResponseMetadata {
                model_name: Some("gpt-4o-mini".to_string()),
                usage: Some(Usage {
                    total_tokens: 20,
                    input_tokens: 15,
                    output_tokens: 5,
                }),
            },
        );

        let record =
            build_usage_record(&config(), "t1", &message).expect("usage metadata is present");
        assert_eq!(record.kind, UsageKind::ToolCall);
        assert_eq!(record.model_name, "gpt-4o-mini");
        assert_eq!(record.thread_id, "t1");
        assert_eq!(record.user_id.as_deref(), Some("u1"));
        assert_eq!(record.total_tokens, 20);
    }

    #[test]
    fn record_tags_response_and_falls_back_to_configured_model() {
        let message = ai_message(
            Vec::new(),
            ResponseMetadata {
                model_name: None,
                usage: Some(Usage::default()),
            },
        );

        let record =
            build_usage_record(&config(), "t1", &message).expect("usage metadata is present");
        assert_eq!(record.kind, UsageKind::Response);
        assert_eq!(record.model_name, "fallback-model");
    }

    #[test]
    fn no_usage_metadata_means_no_record() {
        let message = ai_message(Vec::new(), ResponseMetadata::default());
        assert!(build_usage_record(&config(), "t1", &message).is_none());
    }
}
