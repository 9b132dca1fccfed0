use crate::error::{GatewayError, Result};
use crate::message::{HistoryEntry, Message, Role, ToolResult};

/// In-memory transcript for one agent invocation.
///
/// Messages are only ever appended. Tool results are accepted only as the
/// answer set for the pending calls of the assistant turn directly before
/// them.
#[derive(Default, Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    /// Messages before this index came from the caller, not this invocation.
    seed_len: usize,
}

impl ConversationMemory {
    /// System instructions, then prior history, then the new query last.
    pub fn seeded(system_prompt: &str, history: &[HistoryEntry], query: &str) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system_prompt));
        messages.extend(history.iter().filter_map(HistoryEntry::to_message));
        messages.push(Message::user(query));
        Self {
            seed_len: messages.len(),
            messages,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append the results answering the last assistant turn's calls, in order.
    pub fn push_tool_results(&mut self, results: Vec<ToolResult>) -> Result<()> {
        let pending = match self.messages.last() {
            Some(last) if last.has_pending_calls() => &last.tool_calls,
            _ => {
                return Err(GatewayError::Protocol(
                    "tool results without a preceding tool request".into(),
                ))
            }
        };
        if pending.len() != results.len()
            || pending
                .iter()
                .zip(results.iter())
                .any(|(call, result)| call.id != result.tool_call_id)
        {
            return Err(GatewayError::Protocol(
                "tool results do not match the pending tool calls".into(),
            ));
        }
        self.messages.extend(results.into_iter().map(Message::tool));
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Message> + '_ {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Most recent non-empty assistant text produced after seeding. Replayed
    /// history turns never count.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages[self.seed_len..]
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.trim())
            .find(|content| !content.is_empty())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
