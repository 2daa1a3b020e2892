use crate::errors::AgentError;
use async_trait::async_trait;
use futures::future::join_all;
use palaver_llm::ToolCall;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type ToolFuture = Pin<Box<dyn Future<Output = Result<Value, AgentError>> + Send>>;
pub type ToolExecutor = Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    /// Wire shape advertised to an OpenAI-compatible provider.
    pub fn to_provider_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            },
        })
    }
}

#[derive(Clone)]
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub executor: ToolExecutor,
}

/// Result of one tool call. Failures are encoded here, never raised: a
/// missing tool or a failing executor becomes an error-tagged outcome the
/// model can see and react to.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutcome {
    pub tool_call_id: String,
    pub content: Value,
    pub is_error: bool,
}

impl ToolOutcome {
    fn error(tool_call_id: String, message: String) -> Self {
        Self {
            tool_call_id,
            content: Value::String(message),
            is_error: true,
        }
    }
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn register(&mut self, tool: RegisteredTool) {
        self.tools.insert(tool.definition.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| tool.definition.clone())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Runs every call and returns one outcome per call in request order.
    /// Calls are dispatched concurrently when more than one is present;
    /// `join_all` preserves input order, which is what the graph appends.
    pub async fn dispatch(&self, tool_calls: &[ToolCall]) -> Vec<ToolOutcome> {
        if tool_calls.len() > 1 {
            let futures = tool_calls
                .iter()
                .map(|tool_call| self.dispatch_single(tool_call.clone()));
            return join_all(futures).await;
        }

        let mut outcomes = Vec::with_capacity(tool_calls.len());
        for tool_call in tool_calls {
            outcomes.push(self.dispatch_single(tool_call.clone()).await);
        }
        outcomes
    }

    async fn dispatch_single(&self, tool_call: ToolCall) -> ToolOutcome {
        let Some(registered) = self.get(&tool_call.name) else {
            return ToolOutcome::error(
                tool_call.id,
                format!("Unknown tool: {}", tool_call.name),
            );
        };

        match (registered.executor)(tool_call.arguments).await {
            Ok(content) => ToolOutcome {
                tool_call_id: tool_call.id,
                content,
                is_error: false,
            },
            Err(error) => ToolOutcome::error(tool_call.id, error.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    pub content: String,
    pub metadata: Value,
}

/// Seam for the external retrieval subsystem. The engine never talks to a
/// vector store directly; hosts plug an index in through this trait.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: &Value,
    ) -> Result<Vec<SearchHit>, AgentError>;
}

const SEARCH_TOP_K: usize = 3;

/// Retrieval search over the user's publications, backed by a `SearchIndex`.
pub fn content_search_tool(index: Arc<dyn SearchIndex>) -> RegisteredTool {
    let definition = ToolDefinition {
        name: "content_search".to_string(),
        description:
            "Search for relevant documents within the user's publications. Returns matching \
             document excerpts with their metadata."
                .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query in natural language.",
                },
                "publication_ids": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Publication ids to restrict the search to.",
                },
            },
            "required": ["query"],
        }),
    };

    let executor: ToolExecutor = Arc::new(move |arguments: Value| {
        let index = index.clone();
        Box::pin(async move {
            let query = arguments
                .get("query")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    AgentError::Tool("content_search requires a 'query' argument".to_string())
                })?
                .to_string();

            let filter = match arguments.get("publication_ids") {
                Some(Value::Array(ids)) if !ids.is_empty() => {
                    json!({"publication_id": {"$in": ids}})
                }
                _ => json!({}),
            };

            let hits = index.search(&query, SEARCH_TOP_K, &filter).await?;
            let formatted: Vec<Value> = hits
                .into_iter()
                .map(|hit| json!({"metadata": hit.metadata, "content": hit.content}))
                .collect();
            Ok(Value::Array(formatted))
        })
    });

    RegisteredTool {
        definition,
        executor,
    }
}
