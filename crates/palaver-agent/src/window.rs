use palaver_llm::Message;

/// Context trimming policy applied before each model invocation.
///
/// Both policies are deterministic functions of thread history and are kept
/// explicit and independently selectable: `RecentExchange` caps context to the
/// current exchange, `HeadTail` preserves the original grounding turns plus
/// the most recent ones and is the default when a caller-supplied custom
/// instruction replaces the system prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowPolicy {
    RecentExchange,
    HeadTail,
}

const RECENT_EXCHANGE_FULL_HISTORY_MAX: usize = 4;
const HEAD_TAIL_FULL_HISTORY_MAX: usize = 6;
const HEAD_KEEP: usize = 3;
const TAIL_KEEP: usize = 4;

pub fn select_window(policy: WindowPolicy, messages: &[Message]) -> Vec<Message> {
    match policy {
        WindowPolicy::RecentExchange => recent_exchange(messages),
        WindowPolicy::HeadTail => head_tail(messages),
    }
}

/// Histories of four or fewer messages pass through whole. Otherwise scan
/// backward from the second-to-last message for the most recent human message
/// and keep from there to the end, so the user's latest ask and any trailing
/// tool round-trips stay intact.
fn recent_exchange(messages: &[Message]) -> Vec<Message> {
    if messages.len() <= RECENT_EXCHANGE_FULL_HISTORY_MAX {
        return messages.to_vec();
    }
    for idx in (0..messages.len() - 1).rev() {
        if messages[idx].is_human() {
            return messages[idx..].to_vec();
        }
    }
    messages.to_vec()
}

/// Histories of six or fewer messages pass through whole; otherwise keep the
/// first three and last four.
fn head_tail(messages: &[Message]) -> Vec<Message> {
    if messages.len() <= HEAD_TAIL_FULL_HISTORY_MAX {
        return messages.to_vec();
    }
    let mut window = messages[..HEAD_KEEP].to_vec();
    window.extend_from_slice(&messages[messages.len() - TAIL_KEEP..]);
    window
}
