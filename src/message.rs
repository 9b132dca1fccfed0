//! Transcript messages and the caller-visible conversation history.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A model-issued request to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Text produced for a single tool call, tagged with the call it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub name: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_result: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant turn that asks for tools instead of answering.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    pub fn tool(result: ToolResult) -> Self {
        Self {
            role: Role::Tool,
            content: result.output.clone(),
            tool_calls: Vec::new(),
            tool_result: Some(result),
        }
    }

    pub fn has_pending_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }
}

/// Who spoke a history turn. Both caller dialects are accepted: the QnA
/// route labels people `human`, the FAQ route labels them `user`. Any other
/// label parses as `Unknown` and the turn is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Human,
    User,
    Ai,
    #[serde(other)]
    Unknown,
}

/// One externally visible turn, round-tripped by the caller between requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub speaker: Speaker,
    #[serde(default)]
    pub content: String,
}

impl HistoryEntry {
    pub fn new(speaker: Speaker, content: impl Into<String>) -> Self {
        Self {
            speaker,
            content: content.into(),
        }
    }

    /// Transcript form of the turn; `None` for unknown speakers.
    pub fn to_message(&self) -> Option<Message> {
        match self.speaker {
            Speaker::Human | Speaker::User => Some(Message::user(&self.content)),
            Speaker::Ai => Some(Message::assistant(&self.content)),
            Speaker::Unknown => None,
        }
    }
}

/// Known turns of `history` plus exactly one person turn and one assistant
/// turn.
pub fn extend_history(
    history: &[HistoryEntry],
    person: Speaker,
    question: &str,
    answer: &str,
) -> Vec<HistoryEntry> {
    let mut updated: Vec<HistoryEntry> = history
        .iter()
        .filter(|entry| entry.speaker != Speaker::Unknown)
        .cloned()
        .collect();
    updated.push(HistoryEntry::new(person, question));
    updated.push(HistoryEntry::new(Speaker::Ai, answer));
    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_history_dialects() {
        let raw = r#"[{"type":"human","content":"a"},{"type":"user","content":"b"},{"type":"ai","content":"c"}]"#;
        let entries: Vec<HistoryEntry> = serde_json::from_str(raw).unwrap();

        assert_eq!(entries[0].to_message().unwrap().role, Role::User);
        assert_eq!(entries[1].to_message().unwrap().role, Role::User);
        assert_eq!(entries[2].to_message().unwrap().role, Role::Assistant);
    }

    #[test]
    fn unknown_speakers_parse_and_are_dropped() {
        let raw = r#"[{"type":"system","content":"x"},{"type":"human","content":"a"}]"#;
        let entries: Vec<HistoryEntry> = serde_json::from_str(raw).unwrap();

        assert_eq!(entries[0].speaker, Speaker::Unknown);
        assert!(entries[0].to_message().is_none());

        let updated = extend_history(&entries, Speaker::Human, "질문", "답변");
        assert_eq!(updated.len(), 3);
        assert_eq!(updated[0], HistoryEntry::new(Speaker::Human, "a"));
    }

    #[test]
    fn extend_history_appends_person_then_ai() {
        let prior = vec![HistoryEntry::new(Speaker::Human, "안녕하세요")];
        let updated = extend_history(&prior, Speaker::Human, "질문", "답변");

        assert_eq!(updated.len(), 3);
        assert_eq!(updated[1], HistoryEntry::new(Speaker::Human, "질문"));
        assert_eq!(updated[2], HistoryEntry::new(Speaker::Ai, "답변"));
    }

    #[test]
    fn tool_message_mirrors_output_as_content() {
        let msg = Message::tool(ToolResult {
            tool_call_id: "call_1".into(),
            name: "lookup".into(),
            output: "없음".into(),
        });
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.content, "없음");
        assert!(!msg.has_pending_calls());
    }
}
