use async_trait::async_trait;
use serde_json::{Value, json};

use crate::errors::LlmError;
use crate::message::{AiMessage, Message, ResponseMetadata, ToolCall, Usage, current_timestamp};
use crate::model::ChatModel;

/// Connection settings for an OpenAI-compatible chat-completions endpoint.
///
/// `tools` holds the JSON tool definitions advertised to the provider so the
/// model can request them; the execution graph resolves the requests against
/// its own registry.
#[derive(Clone, Debug)]
pub struct OpenAiCompatConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub tools: Vec<Value>,
}

#[derive(Debug)]
pub struct OpenAiCompatModel {
    config: OpenAiCompatConfig,
    http: reqwest::Client,
}

impl OpenAiCompatModel {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, LlmError> {
        if config.model.trim().is_empty() {
            return Err(LlmError::InvalidConfiguration(
                "model name must not be empty".to_string(),
            ));
        }
        if config.base_url.trim().is_empty() {
            return Err(LlmError::InvalidConfiguration(
                "base_url must not be empty".to_string(),
            ));
        }
        Ok(Self {
            config,
            http: reqwest::Client::new(),
        })
    }

    fn request_body(&self, messages: &[Message]) -> Value {
        let wire_messages: Vec<Value> = messages.iter().map(wire_message).collect();
        let mut body = json!({
            "model": self.config.model,
            "messages": wire_messages,
        });
        if !self.config.tools.is_empty() {
            body["tools"] = Value::Array(self.config.tools.clone());
        }
        body
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatModel {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn invoke(&self, messages: &[Message]) -> Result<AiMessage, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(messages))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = response.json().await?;
        parse_completion(&raw)
    }
}

fn wire_message(message: &Message) -> Value {
    match message {
        Message::System(message) => json!({"role": "system", "content": message.content}),
        Message::Human(message) => json!({"role": "user", "content": message.content}),
        Message::Ai(message) => {
            let mut wire = json!({"role": "assistant", "content": message.content});
            if !message.tool_calls.is_empty() {
                let calls: Vec<Value> = message
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            },
                        })
                    })
                    .collect();
                wire["tool_calls"] = Value::Array(calls);
            }
            wire
        }
        Message::Tool(message) => {
            let content = match &message.content {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            json!({
                "role": "tool",
                "tool_call_id": message.tool_call_id,
                "content": content,
            })
        }
    }
}

fn parse_completion(raw: &Value) -> Result<AiMessage, LlmError> {
    let message = raw
        .pointer("/choices/0/message")
        .ok_or_else(|| LlmError::MalformedResponse("missing choices[0].message".to_string()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| calls.iter().map(parse_tool_call).collect::<Result<_, _>>())
        .transpose()?
        .unwrap_or_default();

    let metadata = ResponseMetadata {
        model_name: raw.get("model").and_then(Value::as_str).map(String::from),
        usage: raw.get("usage").and_then(Usage::from_provider_json),
    };

    Ok(AiMessage::new(
        content,
        tool_calls,
        metadata,
        current_timestamp(),
    ))
}

fn parse_tool_call(raw: &Value) -> Result<ToolCall, LlmError> {
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| LlmError::MalformedResponse("tool call missing id".to_string()))?;
    let name = raw
        .pointer("/function/name")
        .and_then(Value::as_str)
        .ok_or_else(|| LlmError::MalformedResponse("tool call missing function name".to_string()))?;
    let raw_arguments = raw
        .pointer("/function/arguments")
        .and_then(Value::as_str)
        .unwrap_or("{}");
    // Providers send arguments as a JSON string; keep unparseable payloads
    // verbatim so the tool sees what the model produced.
    let arguments = serde_json::from_str(raw_arguments)
        .unwrap_or_else(|_| Value::String(raw_arguments.to_string()));

    Ok(ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    })
}
