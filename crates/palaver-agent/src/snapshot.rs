use crate::errors::AgentError;
use crate::structured::parse_structured_reply;
use palaver_llm::{AiMessage, Message, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// States of the execution graph. `Start` and `End` are bookkeeping; the work
/// happens in the `Assistant`/`ToolDispatch` cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphState {
    Start,
    Assistant,
    ToolDispatch,
    End,
}

impl GraphState {
    /// Transition out of `Assistant`: to `ToolDispatch` iff the assistant
    /// message requested tools, otherwise to `End`.
    pub fn next_after_assistant(has_tool_calls: bool) -> Self {
        if has_tool_calls {
            Self::ToolDispatch
        } else {
            Self::End
        }
    }
}

/// The whole of a thread's durable state: the message history plus the next
/// state to run. Serialized into each checkpoint payload; the graph holds no
/// other state across runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub messages: Vec<Message>,
    pub next_state: GraphState,
}

impl Default for ThreadSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadSnapshot {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_state: GraphState::Start,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, AgentError> {
        serde_json::to_vec(self).map_err(|err| AgentError::Snapshot(err.to_string()))
    }

    pub fn decode(payload: &[u8]) -> Result<Self, AgentError> {
        serde_json::from_slice(payload).map_err(|err| AgentError::Snapshot(err.to_string()))
    }

    pub fn last_ai(&self) -> Option<&AiMessage> {
        self.messages.iter().rev().find_map(Message::as_ai)
    }

    /// Tool calls still owed a result: the calls on the most recent assistant
    /// message.
    pub fn pending_tool_calls(&self) -> Vec<ToolCall> {
        self.last_ai()
            .map(|message| message.tool_calls.clone())
            .unwrap_or_default()
    }

    /// Content of the terminal assistant message, if the thread has reached
    /// `End`.
    pub fn final_output(&self) -> Option<&str> {
        if self.next_state != GraphState::End {
            return None;
        }
        self.last_ai()
            .map(|message| message.content.as_str())
            .filter(|content| !content.is_empty())
    }

    /// Final output parsed as a structured reply; non-JSON content comes back
    /// wrapped as `{"message": <text>}`.
    pub fn structured_final_output(&self) -> Option<Value> {
        self.final_output().map(parse_structured_reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_llm::ResponseMetadata;

    #[test]
    fn assistant_transition_depends_on_tool_calls() {
        assert_eq!(
            GraphState::next_after_assistant(true),
            GraphState::ToolDispatch
        );
        assert_eq!(GraphState::next_after_assistant(false), GraphState::End);
    }

    #[test]
    fn snapshot_encode_decode_round_trips() {
        let mut snapshot = ThreadSnapshot::new();
        snapshot
            .messages
            .push(Message::human("hello", "0".to_string()));
        snapshot.next_state = GraphState::Assistant;

        let payload = snapshot.encode().expect("snapshot should encode");
        let decoded = ThreadSnapshot::decode(&payload).expect("snapshot should decode");
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn final_output_requires_end_state() {
        let mut snapshot = ThreadSnapshot::new();
        snapshot.messages.push(Message::Ai(AiMessage::new(
            "4",
            Vec::new(),
            ResponseMetadata::default(),
            "0".to_string(),
        )));

        snapshot.next_state = GraphState::Assistant;
        assert_eq!(snapshot.final_output(), None);

        snapshot.next_state = GraphState::End;
        assert_eq!(snapshot.final_output(), Some("4"));
    }

    #[test]
    fn structured_final_output_wraps_plain_text() {
        let mut snapshot = ThreadSnapshot::new();
        snapshot.messages.push(Message::Ai(AiMessage::new(
            "{\"answer\": \"4\"}",
            Vec::new(),
            ResponseMetadata::default(),
            "0".to_string(),
        )));
        snapshot.next_state = GraphState::End;
        assert_eq!(
            snapshot.structured_final_output(),
            Some(serde_json::json!({"answer": "4"}))
        );

        snapshot.messages.clear();
        snapshot.messages.push(Message::Ai(AiMessage::new(
            "just text",
            Vec::new(),
            ResponseMetadata::default(),
            "0".to_string(),
        )));
        assert_eq!(
            snapshot.structured_final_output(),
            Some(serde_json::json!({"message": "just text"}))
        );
    }

    #[test]
    fn decode_rejects_garbage_payload() {
        let error = ThreadSnapshot::decode(b"not json").expect_err("garbage should not decode");
        assert!(matches!(error, AgentError::Snapshot(_)));
    }
}
