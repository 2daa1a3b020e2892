use async_trait::async_trait;

use crate::errors::LlmError;
use crate::message::{AiMessage, Message};

/// Model invocation port: given a role-tagged message window, produce one
/// assistant message, optionally carrying requested tool calls and token
/// usage metadata.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn invoke(&self, messages: &[Message]) -> Result<AiMessage, LlmError>;
}
