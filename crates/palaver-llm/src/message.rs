use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type Timestamp = String;

pub fn current_timestamp() -> Timestamp {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs().to_string()
}

/// Token accounting reported by a provider for one completion.
///
/// Providers disagree on field names (`prompt_tokens` vs `input_tokens`,
/// `completion_tokens` vs `output_tokens`); `from_provider_json` accepts
/// either naming.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn from_provider_json(raw: &Value) -> Option<Self> {
        if !raw.is_object() {
            return None;
        }
        let field = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| raw.get(key).and_then(Value::as_u64))
                .unwrap_or(0)
        };
        Some(Self {
            total_tokens: field(&["total_tokens"]),
            input_tokens: field(&["prompt_tokens", "input_tokens"]),
            output_tokens: field(&["completion_tokens", "output_tokens"]),
        })
    }
}

/// Provider metadata attached to an assistant message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub model_name: Option<String>,
    pub usage: Option<Usage>,
}

/// A tool invocation requested by the model. The `id` correlates the call to
/// the tool message that eventually answers it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemMessage {
    pub id: String,
    pub content: String,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HumanMessage {
    pub id: String,
    pub content: String,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiMessage {
    pub id: String,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub metadata: ResponseMetadata,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolMessage {
    pub id: String,
    pub tool_call_id: String,
    pub content: Value,
    pub is_error: bool,
    pub timestamp: Timestamp,
}

/// One entry in a thread's history. Messages are immutable once appended; the
/// execution graph only ever appends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System(SystemMessage),
    Human(HumanMessage),
    Ai(AiMessage),
    Tool(ToolMessage),
}

impl Message {
    pub fn system(content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::System(SystemMessage {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            timestamp,
        })
    }

    pub fn human(content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::Human(HumanMessage {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            timestamp,
        })
    }

    pub fn id(&self) -> &str {
        match self {
            Self::System(message) => &message.id,
            Self::Human(message) => &message.id,
            Self::Ai(message) => &message.id,
            Self::Tool(message) => &message.id,
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Self::Human(_))
    }

    pub fn as_ai(&self) -> Option<&AiMessage> {
        match self {
            Self::Ai(message) => Some(message),
            _ => None,
        }
    }
}

impl AiMessage {
    pub fn new(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        metadata: ResponseMetadata,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            tool_calls,
            metadata,
            timestamp,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

impl ToolMessage {
    pub fn new(
        tool_call_id: impl Into<String>,
        content: Value,
        is_error: bool,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tool_call_id: tool_call_id.into(),
            content,
            is_error,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn usage_accepts_prompt_completion_field_names() {
        let usage = Usage::from_provider_json(&json!({
            "total_tokens": 284,
            "prompt_tokens": 192,
            "completion_tokens": 92,
        }))
        .expect("object input should parse");

        assert_eq!(usage.total_tokens, 284);
        assert_eq!(usage.input_tokens, 192);
        assert_eq!(usage.output_tokens, 92);
    }

    #[test]
    fn usage_accepts_input_output_field_names() {
        let usage = Usage::from_provider_json(&json!({
            "total_tokens": 10,
            "input_tokens": 7,
            "output_tokens": 3,
        }))
        .expect("object input should parse");

        assert_eq!(usage.input_tokens, 7);
        assert_eq!(usage.output_tokens, 3);
    }

    #[test]
    fn usage_missing_fields_default_to_zero() {
        let usage = Usage::from_provider_json(&json!({})).expect("object input should parse");
        assert_eq!(usage, Usage::default());

        assert!(Usage::from_provider_json(&Value::Null).is_none());
    }

    #[test]
    fn message_role_tag_round_trips() {
        let message = Message::human("hello", "0".to_string());
        let encoded = serde_json::to_value(&message).expect("message should serialize");
        assert_eq!(encoded["role"], "human");

        let decoded: Message = serde_json::from_value(encoded).expect("message should deserialize");
        assert_eq!(decoded, message);
    }
}
