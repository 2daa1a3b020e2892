use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// The externally observable unit of incremental progress, produced
/// one-to-one with graph steps and delivered in step-completion order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A tool is about to run.
    Action { tool: String, tool_input: Value },
    /// Raw result of one tool call.
    Observation { result: Value },
    /// Terminal assistant content; the run has reached `End`.
    FinalOutput { message: String },
}

/// Cooperative cancellation flag checked by the graph between steps.
#[derive(Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Producer half of the event stream. A closed receiver is treated as
/// cancellation so an abandoned consumer stops the run at the next step
/// boundary.
pub struct EventSink {
    sender: Option<UnboundedSender<StreamEvent>>,
    cancel: CancelHandle,
}

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<StreamEvent>, CancelHandle) {
        let (sender, receiver) = unbounded_channel();
        let cancel = CancelHandle::new();
        (
            Self {
                sender: Some(sender),
                cancel: cancel.clone(),
            },
            receiver,
            cancel,
        )
    }

    /// Sink for synchronous runs that want no incremental delivery.
    pub fn disabled() -> Self {
        Self {
            sender: None,
            cancel: CancelHandle::new(),
        }
    }

    pub fn emit(&self, event: StreamEvent) {
        if let Some(sender) = &self.sender {
            if sender.send(event).is_err() {
                self.cancel.request_cancel();
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stream_event_serializes_with_type_tag() {
        let event = StreamEvent::Action {
            tool: "content_search".to_string(),
            tool_input: json!({"query": "x"}),
        };
        let encoded = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(encoded["type"], "action");
        assert_eq!(encoded["tool"], "content_search");

        let final_event = StreamEvent::FinalOutput {
            message: "4".to_string(),
        };
        let encoded = serde_json::to_value(&final_event).expect("event should serialize");
        assert_eq!(encoded, json!({"type": "final_output", "message": "4"}));
    }

    #[test]
    fn dropped_receiver_counts_as_cancellation() {
        let (sink, receiver, _cancel) = EventSink::channel();
        drop(receiver);

        sink.emit(StreamEvent::FinalOutput {
            message: "done".to_string(),
        });
        assert!(sink.is_cancelled());
    }

    #[test]
    fn cancel_handle_is_shared() {
        let (sink, _receiver, cancel) = EventSink::channel();
        assert!(!sink.is_cancelled());
        cancel.request_cancel();
        assert!(sink.is_cancelled());
    }
}
