use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{GatewayError, Result};
use crate::guardrails::AnswerPostProcessor;
use crate::llm::{CompletionOptions, LanguageModel};
use crate::memory::ConversationMemory;
use crate::message::{HistoryEntry, Message, ToolCall, ToolResult};
use crate::tool::{ToolDescription, ToolRegistry};

/// Returned when the round limit is hit before the model produced any text
/// in the current exchange.
pub const GIVE_UP_NOTICE: &str = "요청하신 내용을 처리하는 중 조회 단계가 너무 길어져 답변을 완성하지 못했습니다. 질문을 조금 더 구체적으로 다시 말씀해 주세요.";

/// Where the control loop currently is.
#[derive(Debug)]
enum LoopState {
    Reasoning,
    Acting(Vec<ToolCall>),
    Done(String),
    GaveUp,
}

/// Final answer of one agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentReply {
    pub answer: String,
    /// Inference rounds used.
    pub rounds: usize,
    pub tool_calls: usize,
    /// Set when the round limit cut the exchange short.
    pub degraded: bool,
}

/// Tool-augmented agent: the model reasons, requests lookups, reads their
/// results and eventually answers.
pub struct Agent<M: LanguageModel> {
    system_prompt: String,
    model: Arc<M>,
    tools: Arc<ToolRegistry>,
    max_rounds: usize,
    options: CompletionOptions,
    post_processor: Option<AnswerPostProcessor>,
}

impl<M: LanguageModel> Agent<M> {
    pub fn new(model: Arc<M>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            system_prompt: "You are a helpful agent.".to_string(),
            model,
            tools,
            max_rounds: 8,
            options: CompletionOptions::default(),
            post_processor: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_post_processor(mut self, post_processor: AnswerPostProcessor) -> Self {
        self.post_processor = Some(post_processor);
        self
    }

    /// Run one exchange: seed the transcript, loop until the model answers
    /// or the round limit is reached, then post-process the answer.
    #[instrument(skip_all, fields(history = history.len()))]
    pub async fn respond(&self, history: &[HistoryEntry], query: &str) -> Result<AgentReply> {
        let mut memory = ConversationMemory::seeded(&self.system_prompt, history, query);
        let tools = self.tools.describe();
        let mut state = LoopState::Reasoning;
        let mut rounds = 0;
        let mut tool_calls = 0;

        let (answer, degraded) = loop {
            state = match state {
                LoopState::Reasoning if rounds >= self.max_rounds => LoopState::GaveUp,
                LoopState::Reasoning => {
                    rounds += 1;
                    let message = self.infer(&memory, &tools).await?;
                    let next = if message.has_pending_calls() {
                        LoopState::Acting(message.tool_calls.clone())
                    } else {
                        LoopState::Done(message.content.clone())
                    };
                    memory.push(message);
                    next
                }
                LoopState::Acting(calls) => {
                    tool_calls += calls.len();
                    let results = self.execute_tool_calls(&calls).await;
                    memory.push_tool_results(results)?;
                    LoopState::Reasoning
                }
                LoopState::Done(answer) => break (answer, false),
                LoopState::GaveUp => {
                    warn!(rounds, "round limit reached before a final answer");
                    let partial = memory
                        .last_assistant_text()
                        .map(str::to_string)
                        .unwrap_or_else(|| GIVE_UP_NOTICE.to_string());
                    break (partial, true);
                }
            };
        };

        let answer = match &self.post_processor {
            Some(post) => post.apply(query, &answer),
            None => answer,
        };
        info!(rounds, tool_calls, degraded, "agent finished");
        Ok(AgentReply {
            answer,
            rounds,
            tool_calls,
            degraded,
        })
    }

    /// One model call producing exactly one assistant message: either tool
    /// requests or final text.
    async fn infer(
        &self,
        memory: &ConversationMemory,
        tools: &[ToolDescription],
    ) -> Result<Message> {
        let completion = self
            .model
            .complete_chat(memory.messages(), tools, self.options)
            .await?;
        let content = completion.content.unwrap_or_default();

        if !completion.tool_calls.is_empty() {
            let calls = assign_call_ids(completion.tool_calls);
            debug!(calls = calls.len(), "model requested tools");
            return Ok(Message::assistant_with_calls(content, calls));
        }
        if content.trim().is_empty() {
            return Err(GatewayError::LanguageModel(
                "model returned neither text nor tool calls".into(),
            ));
        }
        Ok(Message::assistant(content))
    }

    /// Run every requested call in order. Never fails: unknown tools and tool
    /// errors become text the model can read on the next round.
    pub async fn execute_tool_calls(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let output = match self.tools.call(&call.name, call.arguments.clone()).await {
                Ok(text) => text,
                Err(GatewayError::ToolNotFound(name)) => {
                    warn!(tool = %name, "model requested an unknown tool");
                    tool_not_found_notice(&name)
                }
                Err(err) => {
                    warn!(tool = %call.name, error = %err, "tool call failed");
                    format!("[tool:{}] 실행 오류: {err}", call.name)
                }
            };
            results.push(ToolResult {
                tool_call_id: call.id.clone(),
                name: call.name.clone(),
                output,
            });
        }
        results
    }
}

pub fn tool_not_found_notice(name: &str) -> String {
    format!("[tool:{name}] 등록되지 않은 도구입니다. 다른 방법으로 답변을 시도해 주세요.")
}

/// Give every call an id that is unique within its turn.
fn assign_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.is_empty() || !seen.insert(call.id.clone()) {
                call.id = format!("call_{}", Uuid::new_v4().simple());
                seen.insert(call.id.clone());
            }
            call
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::llm::StubModel;
    use crate::message::{Role, Speaker};
    use crate::tool::Tool;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the `text` field back"
        }

        async fn call(&self, input: Value) -> Result<String> {
            Ok(input["text"].as_str().unwrap_or_default().to_string())
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut tools = ToolRegistry::new();
        tools.register(EchoTool).unwrap();
        Arc::new(tools)
    }

    #[tokio::test]
    async fn returns_llm_response_without_tools() {
        let model = StubModel::new(vec![r#"{"action":"respond","content":"Hello!"}"#.into()]);
        let agent = Agent::new(model.clone(), registry());

        let reply = agent.respond(&[], "hi").await.unwrap();

        assert_eq!(reply.answer, "Hello!");
        assert_eq!(reply.rounds, 1);
        assert_eq!(reply.tool_calls, 0);
        assert_eq!(model.request_count(), 1);
    }

    #[tokio::test]
    async fn executes_tool_then_replies() {
        let model = StubModel::new(vec![
            r#"{"action":"call_tool","name":"echo","arguments":{"text":"ping"}}"#.into(),
            r#"{"action":"respond","content":"Echoed your request."}"#.into(),
        ]);
        let agent = Agent::new(model.clone(), registry());

        let reply = agent.respond(&[], "say ping").await.unwrap();

        assert_eq!(reply.answer, "Echoed your request.");
        assert_eq!(reply.rounds, 2);
        let second = &model.requests()[1];
        let tool_msg = second.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.content, "ping");
        let request = &second[second.len() - 2];
        assert_eq!(
            tool_msg.tool_result.as_ref().unwrap().tool_call_id,
            request.tool_calls[0].id
        );
    }

    #[tokio::test]
    async fn gives_up_after_round_limit() {
        let call = r#"{"action":"call_tool","name":"echo","arguments":{"text":"again"}}"#;
        let model = StubModel::new(vec![call.into(), call.into(), call.into()]);
        let agent = Agent::new(model.clone(), registry()).with_max_rounds(2);

        let reply = agent.respond(&[], "loop forever").await.unwrap();

        assert!(reply.degraded);
        assert_eq!(reply.rounds, 2);
        assert_eq!(reply.answer, GIVE_UP_NOTICE);
        assert_eq!(model.request_count(), 2);
    }

    #[tokio::test]
    async fn give_up_never_returns_a_previous_turn() {
        let call = r#"{"action":"call_tool","name":"echo","arguments":{"text":"again"}}"#;
        let model = StubModel::new(vec![call.into(), call.into()]);
        let agent = Agent::new(model, registry()).with_max_rounds(2);
        let history = vec![
            HistoryEntry::new(Speaker::Human, "타이레놀 용법?"),
            HistoryEntry::new(Speaker::Ai, "하루 최대 4g까지 복용합니다."),
        ];

        let reply = agent.respond(&history, "와파린 병용 가능?").await.unwrap();

        assert!(reply.degraded);
        assert_eq!(reply.answer, GIVE_UP_NOTICE);
    }

    #[tokio::test]
    async fn give_up_returns_interim_text_from_this_exchange() {
        let model = StubModel::new(vec![
            r#"{"action":"call_tool","name":"echo","arguments":{"text":"a"},"content":"병용금기 여부를 확인하고 있습니다."}"#.into(),
            r#"{"action":"call_tool","name":"echo","arguments":{"text":"b"}}"#.into(),
        ]);
        let agent = Agent::new(model, registry()).with_max_rounds(2);
        let history = vec![
            HistoryEntry::new(Speaker::Human, "이전 질문"),
            HistoryEntry::new(Speaker::Ai, "이전 답변"),
        ];

        let reply = agent.respond(&history, "와파린 병용 가능?").await.unwrap();

        assert!(reply.degraded);
        assert_eq!(reply.answer, "병용금기 여부를 확인하고 있습니다.");
    }

    #[tokio::test]
    async fn empty_completion_is_fatal() {
        let model = StubModel::new(vec!["".into()]);
        let agent = Agent::new(model, registry());

        let err = agent.respond(&[], "hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::LanguageModel(_)));
    }

    #[test]
    fn assigns_unique_ids() {
        let calls = vec![
            ToolCall {
                id: String::new(),
                name: "echo".into(),
                arguments: json!({}),
            },
            ToolCall {
                id: "dup".into(),
                name: "echo".into(),
                arguments: json!({}),
            },
            ToolCall {
                id: "dup".into(),
                name: "echo".into(),
                arguments: json!({}),
            },
        ];
        let ids: HashSet<String> = assign_call_ids(calls).into_iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("dup"));
    }
}
