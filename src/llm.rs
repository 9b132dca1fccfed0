//! Language model abstraction and the OpenAI chat-completions client.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::{GatewayError, Result};
use crate::message::{Message, Role, ToolCall};
use crate::tool::ToolDescription;

/// Result of a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Per-call sampling knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Minimal abstraction around a chat completion provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
        options: CompletionOptions,
    ) -> Result<ModelCompletion>;
}

/// One system + one user message, no tools, non-empty text back.
pub async fn complete_text<M: LanguageModel + ?Sized>(
    model: &M,
    system: &str,
    user: &str,
    options: CompletionOptions,
) -> Result<String> {
    let messages = [Message::system(system), Message::user(user)];
    let completion = model.complete_chat(&messages, &[], options).await?;
    completion
        .content
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| GatewayError::LanguageModel("OpenAI 응답이 비어 있습니다.".into()))
}

fn coalesce_error(status: reqwest::StatusCode, body: &str, provider: &str) -> GatewayError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return GatewayError::LanguageModel(format!("{provider} rate limit exceeded: {body}"));
    }
    GatewayError::LanguageModel(format!("{provider} request failed with {}: {body}", status))
}

fn serialize_tool_arguments(args: &Value) -> String {
    serde_json::to_string(args).unwrap_or_else(|_| args.to_string())
}

#[derive(Clone)]
pub struct OpenAIClient {
    http: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
    organization: Option<String>,
}

impl OpenAIClient {
    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .ok_or_else(|| GatewayError::Config("missing OpenAI API key in model config".into()))?;
        let base_url = cfg
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(cfg.timeout_secs))
                .build()
                .map_err(|err| GatewayError::Config(format!("http client error: {err}")))?,
            model: cfg.model.clone(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            organization: cfg.organization.clone(),
        })
    }

    fn to_openai_messages(&self, messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|message| {
                let role = match message.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                }
                .to_string();

                let tool_calls = if message.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        message
                            .tool_calls
                            .iter()
                            .map(|call| OpenAiToolCall {
                                id: call.id.clone(),
                                r#type: "function".to_string(),
                                function: OpenAiFunctionCall {
                                    name: call.name.clone(),
                                    arguments: serialize_tool_arguments(&call.arguments),
                                },
                            })
                            .collect(),
                    )
                };

                // Assistant turns that only request tools carry no text.
                let content = if tool_calls.is_some() && message.content.trim().is_empty() {
                    None
                } else {
                    Some(message.content.clone())
                };

                OpenAiMessage {
                    role,
                    content,
                    tool_call_id: message
                        .tool_result
                        .as_ref()
                        .map(|result| result.tool_call_id.clone()),
                    tool_calls,
                }
            })
            .collect()
    }

    fn to_openai_tools(&self, tools: &[ToolDescription]) -> Option<Vec<OpenAiTool>> {
        if tools.is_empty() {
            return None;
        }

        Some(
            tools
                .iter()
                .map(|tool| OpenAiTool {
                    r#type: "function".to_string(),
                    function: OpenAiFunction {
                        name: tool.name.clone(),
                        description: Some(tool.description.clone()),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
        )
    }
}

#[async_trait]
impl LanguageModel for OpenAIClient {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
        options: CompletionOptions,
    ) -> Result<ModelCompletion> {
        let mut payload = json!({
            "model": self.model,
            "messages": self.to_openai_messages(messages),
        });
        if let Some(tools) = self.to_openai_tools(tools) {
            payload["tools"] = json!(tools);
            payload["tool_choice"] = json!("auto");
        }
        if let Some(temperature) = options.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }

        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            );
        if let Some(org) = &self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }
        debug!(model = %self.model, messages = messages.len(), "sending chat completion");
        let resp = builder
            .json(&payload)
            .send()
            .await
            .map_err(|err| GatewayError::LanguageModel(format!("OpenAI request error: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, "openai"));
        }

        let body: OpenAiResponse = resp.json().await.map_err(|err| {
            GatewayError::LanguageModel(format!("OpenAI response parse error: {err}"))
        })?;

        let first = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::LanguageModel("OpenAI returned no choices".into()))?;

        let tool_calls = first
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let arguments = serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| Value::String(call.function.arguments.clone()));
                ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments,
                }
            })
            .collect();

        Ok(ModelCompletion {
            content: first.message.content,
            tool_calls,
        })
    }
}

/// Scripted model for tests and local runs.
///
/// Each scripted entry is a JSON directive:
/// `{"action":"respond","content":...}`,
/// `{"action":"call_tool","name":...,"arguments":{...}}` (optionally with
/// interim `"content"`),
/// `{"action":"call_tools","calls":[{"name":...,"arguments":{...}}, ...]}` or
/// `{"action":"fail","error":...}`. Anything else is returned verbatim as text.
pub struct StubModel {
    responses: Mutex<VecDeque<String>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl StubModel {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Transcripts received so far, one per completion request.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct StubCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum StubDirective {
    Respond { content: String },
    CallTool {
        name: String,
        arguments: Value,
        #[serde(default)]
        content: Option<String>,
    },
    CallTools {
        calls: Vec<StubCall>,
        #[serde(default)]
        content: Option<String>,
    },
    Fail { error: String },
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete_chat(
        &self,
        messages: &[Message],
        _tools: &[ToolDescription],
        _options: CompletionOptions,
    ) -> Result<ModelCompletion> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(messages.to_vec());
        }
        let raw = self
            .responses
            .lock()
            .map_err(|_| GatewayError::LanguageModel("stub model poisoned".into()))?
            .pop_front()
            .ok_or_else(|| {
                GatewayError::LanguageModel("StubModel ran out of scripted responses".into())
            })?;

        let to_call = |name: String, arguments: Value| ToolCall {
            id: String::new(),
            name,
            arguments,
        };
        match serde_json::from_str::<StubDirective>(&raw) {
            Ok(StubDirective::Respond { content }) => Ok(ModelCompletion {
                content: Some(content),
                tool_calls: Vec::new(),
            }),
            Ok(StubDirective::CallTool {
                name,
                arguments,
                content,
            }) => Ok(ModelCompletion {
                content,
                tool_calls: vec![to_call(name, arguments)],
            }),
            Ok(StubDirective::CallTools { calls, content }) => Ok(ModelCompletion {
                content,
                tool_calls: calls
                    .into_iter()
                    .map(|c| to_call(c.name, c.arguments))
                    .collect(),
            }),
            Ok(StubDirective::Fail { error }) => Err(GatewayError::LanguageModel(error)),
            Err(_) => Ok(ModelCompletion {
                content: Some(raw),
                tool_calls: Vec::new(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    r#type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiTool {
    r#type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolResult;

    fn client() -> OpenAIClient {
        OpenAIClient::from_config(&ModelConfig {
            api_key: Some("sk-test".into()),
            ..ModelConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn requires_api_key() {
        assert!(matches!(
            OpenAIClient::from_config(&ModelConfig::default()),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn serializes_tool_requests_and_results() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "get_drug_general_info".into(),
            arguments: json!({"item_name": "타이레놀"}),
        };
        let messages = vec![
            Message::system("sys"),
            Message::user("타이레놀 용법"),
            Message::assistant_with_calls("", vec![call]),
            Message::tool(ToolResult {
                tool_call_id: "call_1".into(),
                name: "get_drug_general_info".into(),
                output: "효능: 해열".into(),
            }),
        ];

        let wire = serde_json::to_value(client().to_openai_messages(&messages)).unwrap();

        assert_eq!(wire[2]["role"], "assistant");
        assert!(wire[2]["content"].is_null());
        assert_eq!(wire[2]["tool_calls"][0]["function"]["name"], "get_drug_general_info");
        assert_eq!(
            wire[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"item_name":"타이레놀"}"#
        );
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "call_1");
        assert_eq!(wire[3]["content"], "효능: 해열");
    }

    #[tokio::test]
    async fn complete_text_rejects_blank_completion() {
        let model = StubModel::new(vec!["   ".into()]);
        let err = complete_text(model.as_ref(), "s", "u", CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::LanguageModel(_)));
    }

    #[tokio::test]
    async fn stub_scripts_parallel_calls() {
        let model = StubModel::new(vec![
            r#"{"action":"call_tools","calls":[{"name":"a","arguments":{}},{"name":"b"}]}"#.into(),
        ]);
        let completion = model
            .complete_chat(&[Message::user("q")], &[], CompletionOptions::default())
            .await
            .unwrap();

        assert!(completion.content.is_none());
        let names: Vec<&str> = completion.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(model.request_count(), 1);
    }
}
