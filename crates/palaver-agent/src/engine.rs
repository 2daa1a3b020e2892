use crate::config::AgentConfig;
use crate::errors::AgentError;
use crate::events::{CancelHandle, EventSink, StreamEvent};
use crate::snapshot::{GraphState, ThreadSnapshot};
use crate::tools::ToolRegistry;
use crate::usage::{UsageStore, build_usage_record};
use crate::window::select_window;
use palaver_checkpoint::{CheckpointId, CheckpointStore, ThreadId};
use palaver_llm::{ChatModel, Message, ToolMessage, current_timestamp};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// A running thread: ordered stream events, a cancellation handle, and the
/// final snapshot once the run completes.
pub struct RunHandle {
    pub events: UnboundedReceiver<StreamEvent>,
    pub cancel: CancelHandle,
    task: JoinHandle<Result<ThreadSnapshot, AgentError>>,
}

impl RunHandle {
    pub async fn join(self) -> Result<ThreadSnapshot, AgentError> {
        self.task
            .await
            .map_err(|err| AgentError::Join(err.to_string()))?
    }
}

/// The agent execution graph. Holds no per-thread state between runs: the
/// checkpoint store is the only state, so any thread can be resumed from its
/// `thread_id` alone.
pub struct AgentEngine {
    config: AgentConfig,
    model: Arc<dyn ChatModel>,
    store: Arc<dyn CheckpointStore>,
    tools: Arc<ToolRegistry>,
    usage_store: Option<Arc<dyn UsageStore>>,
    // Mutual exclusion by thread id: at most one run, hence one checkpoint
    // writer, per thread. Distinct threads run fully concurrently.
    thread_locks: Mutex<HashMap<ThreadId, Arc<tokio::sync::Mutex<()>>>>,
}

impl AgentEngine {
    pub fn new(
        config: AgentConfig,
        model: Arc<dyn ChatModel>,
        store: Arc<dyn CheckpointStore>,
        tools: ToolRegistry,
        usage_store: Option<Arc<dyn UsageStore>>,
    ) -> Result<Self, AgentError> {
        config.validate()?;
        Ok(Self {
            config,
            model,
            store,
            tools: Arc::new(tools),
            usage_store,
            thread_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Starts or resumes the thread and returns a handle streaming one event
    /// per completed step, in step-completion order.
    pub fn start_or_resume(
        self: &Arc<Self>,
        thread_id: impl Into<ThreadId>,
        user_input: impl Into<String>,
    ) -> RunHandle {
        let (sink, events, cancel) = EventSink::channel();
        let engine = self.clone();
        let thread_id = thread_id.into();
        let user_input = user_input.into();
        let task =
            tokio::spawn(async move { engine.run(&thread_id, user_input, sink).await });
        RunHandle {
            events,
            cancel,
            task,
        }
    }

    /// Runs the thread to its terminal state without incremental delivery.
    pub async fn start_or_resume_sync(
        &self,
        thread_id: &str,
        user_input: impl Into<String>,
    ) -> Result<ThreadSnapshot, AgentError> {
        self.run(thread_id, user_input.into(), EventSink::disabled())
            .await
    }

    /// Latest committed snapshot for the thread, or `None` for an unseen one.
    pub async fn get_state(&self, thread_id: &str) -> Result<Option<ThreadSnapshot>, AgentError> {
        let latest = self.store.get_latest(&thread_id.to_string()).await?;
        latest
            .map(|checkpoint| ThreadSnapshot::decode(&checkpoint.payload))
            .transpose()
    }

    /// Removes every checkpoint for the thread; returns whether anything was
    /// deleted.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<bool, AgentError> {
        let lock = self.thread_lock(thread_id);
        let _guard = lock.lock().await;
        Ok(self.store.delete(&thread_id.to_string()).await?)
    }

    async fn run(
        &self,
        thread_id: &str,
        user_input: String,
        sink: EventSink,
    ) -> Result<ThreadSnapshot, AgentError> {
        let lock = self.thread_lock(thread_id);
        let _guard = lock.lock().await;

        let thread_key = thread_id.to_string();
        let latest = self.store.get_latest(&thread_key).await?;
        let (mut snapshot, mut parent_id) = match latest {
            Some(checkpoint) => (
                ThreadSnapshot::decode(&checkpoint.payload)?,
                Some(checkpoint.checkpoint_id),
            ),
            None => (ThreadSnapshot::new(), None),
        };

        // Start step: append the new human input and arm the assistant. This
        // is the run's initial checkpoint; later steps chain off it.
        snapshot
            .messages
            .push(Message::human(user_input, current_timestamp()));
        snapshot.next_state = GraphState::Assistant;
        parent_id = self
            .write_checkpoint(&thread_key, parent_id, &snapshot)
            .await?;

        let limit = self.config.recursion_limit;
        let mut steps = 0usize;
        loop {
            // Cancellation is cooperative and checked only between steps, so
            // the last written checkpoint stays the valid resume point.
            if sink.is_cancelled() {
                tracing::debug!(thread_id, "run cancelled between steps");
                return Ok(snapshot);
            }

            match snapshot.next_state {
                GraphState::Start => {
                    snapshot.next_state = GraphState::Assistant;
                }
                GraphState::Assistant => {
                    if steps >= limit {
                        return Err(AgentError::RecursionLimitExceeded { limit });
                    }
                    steps += 1;
                    parent_id = self
                        .assistant_step(&thread_key, parent_id, &mut snapshot, &sink)
                        .await?;
                }
                GraphState::ToolDispatch => {
                    if steps >= limit {
                        return Err(AgentError::RecursionLimitExceeded { limit });
                    }
                    steps += 1;
                    parent_id = self
                        .tool_dispatch_step(&thread_key, parent_id, &mut snapshot, &sink)
                        .await?;
                }
                GraphState::End => break,
            }
        }

        Ok(snapshot)
    }

    /// One `Assistant` step: trim the window, invoke the model, append the
    /// assistant message, fire the usage hook, checkpoint, then emit. A model
    /// failure propagates before anything is appended or checkpointed, so a
    /// later resume retries from the last good checkpoint.
    async fn assistant_step(
        &self,
        thread_id: &ThreadId,
        parent_id: Option<CheckpointId>,
        snapshot: &mut ThreadSnapshot,
        sink: &EventSink,
    ) -> Result<Option<CheckpointId>, AgentError> {
        let window = select_window(self.config.effective_window_policy(), &snapshot.messages);
        let mut request = Vec::with_capacity(window.len() + 1);
        if let Some(prompt) = self.config.effective_system_prompt() {
            request.push(Message::system(prompt, current_timestamp()));
        }
        request.extend(window);

        let ai_message = self.model.invoke(&request).await?;
        tracing::debug!(
            thread_id,
            tool_calls = ai_message.tool_calls.len(),
            "assistant step completed"
        );

        self.fire_usage_hook(thread_id, &ai_message);

        let has_tool_calls = ai_message.has_tool_calls();
        let content = ai_message.content.clone();
        let tool_calls = ai_message.tool_calls.clone();
        snapshot.messages.push(Message::Ai(ai_message));
        snapshot.next_state = GraphState::next_after_assistant(has_tool_calls);
        let parent_id = self.write_checkpoint(thread_id, parent_id, snapshot).await?;

        if has_tool_calls {
            for tool_call in &tool_calls {
                sink.emit(StreamEvent::Action {
                    tool: tool_call.name.clone(),
                    tool_input: tool_call.arguments.clone(),
                });
            }
        } else if !content.is_empty() {
            sink.emit(StreamEvent::FinalOutput { message: content });
        }

        Ok(parent_id)
    }

    /// One `ToolDispatch` step: run every call requested by the most recent
    /// assistant message and append exactly one tool message per call, in
    /// request order, then checkpoint once.
    async fn tool_dispatch_step(
        &self,
        thread_id: &ThreadId,
        parent_id: Option<CheckpointId>,
        snapshot: &mut ThreadSnapshot,
        sink: &EventSink,
    ) -> Result<Option<CheckpointId>, AgentError> {
        let tool_calls = snapshot.pending_tool_calls();
        let outcomes = self.tools.dispatch(&tool_calls).await;

        let mut observed = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            observed.push(outcome.content.clone());
            snapshot.messages.push(Message::Tool(ToolMessage::new(
                outcome.tool_call_id,
                outcome.content,
                outcome.is_error,
                current_timestamp(),
            )));
        }
        snapshot.next_state = GraphState::Assistant;
        let parent_id = self.write_checkpoint(thread_id, parent_id, snapshot).await?;

        for result in observed {
            sink.emit(StreamEvent::Observation { result });
        }

        Ok(parent_id)
    }

    async fn write_checkpoint(
        &self,
        thread_id: &ThreadId,
        parent_id: Option<CheckpointId>,
        snapshot: &ThreadSnapshot,
    ) -> Result<Option<CheckpointId>, AgentError> {
        let payload = snapshot.encode()?;
        let checkpoint = self.store.put(thread_id, parent_id, payload).await?;
        Ok(Some(checkpoint.checkpoint_id))
    }

    /// Usage accounting is observability, not conversation state: recording
    /// runs detached and its failure is logged and swallowed.
    fn fire_usage_hook(&self, thread_id: &str, message: &palaver_llm::AiMessage) {
        let Some(store) = self.usage_store.clone() else {
            return;
        };
        let Some(record) = build_usage_record(&self.config, thread_id, message) else {
            return;
        };
        tokio::spawn(async move {
            if let Err(error) = store.record(record).await {
                tracing::warn!(%error, "usage recording failed; run continues");
            }
        });
    }

    fn thread_lock(&self, thread_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .thread_locks
            .lock()
            .expect("thread lock registry mutex poisoned");
        locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
