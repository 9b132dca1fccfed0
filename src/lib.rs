//! AI gateway for pharmacy staff.
//!
//! The crate provides:
//! - A language model abstraction (`LanguageModel`) with an OpenAI client and a scripted stub.
//! - Drug lookup tools over the Korean public drug-information services.
//! - An `Agent` that loops between the model and those tools, then appends a
//!   safety footer and tidies the answer layout.
//! - Summarizers for epidemic reports, law amendments and product leaflets.
//! - A retrieval-augmented FAQ bot.
//! - An axum router exposing all of the above.

mod agent;
mod config;
mod error;
mod extract;
mod faq;
mod formatting;
mod guardrails;
mod html;
mod knowledge;
mod llm;
mod memory;
mod message;
mod prompts;
mod server;
mod summarize;
mod telemetry;
mod tool;
pub mod tools;

pub use agent::{tool_not_found_notice, Agent, AgentReply, GIVE_UP_NOTICE};
pub use config::{
    AgentConfig, AppConfig, ExtractionConfig, FaqConfig, GuardrailConfig, LookupConfig,
    ModelConfig, ServerConfig,
};
pub use error::{GatewayError, Result};
pub use extract::{decode_text, ensure_text, HttpTextExtractor, TextExtractor};
pub use faq::{fold_pairs, load_corpus, FaqAnswer, FaqBot};
pub use formatting::reformat;
pub use guardrails::{
    AnswerPostProcessor, RiskKeywordScanner, RiskScan, SafetyFooter, SAFETY_DISCLAIMER,
};
pub use html::{sanitize_html, ALLOWED_TAGS};
pub use knowledge::{
    BigramEmbedder, Embedder, FaqEntry, InMemoryVectorStore, KnowledgeBase, Retriever,
    ScoredEntry, VectorStore,
};
pub use llm::{
    complete_text, CompletionOptions, LanguageModel, ModelCompletion, OpenAIClient, StubModel,
};
pub use memory::ConversationMemory;
pub use message::{extend_history, HistoryEntry, Message, Role, Speaker, ToolCall, ToolResult};
pub use prompts::QNA_SYSTEM_PROMPT;
pub use server::{
    has_extension, router, serve, Envelope, FaqRequest, GatewayState, QnaError, QnaRequest,
    QnaResponse,
};
pub use summarize::{
    DocumentKind, DocumentSummary, EpidemicSummary, Summarizer, NEW_PRODUCT_INPUT_CHARS,
};
pub use telemetry::{init_tracing, DEFAULT_FILTER};
pub use tool::{parse_arguments, Tool, ToolDescription, ToolRegistry};
pub use tools::{lookup_toolkit, register_lookup_tools, LookupClient, LookupTool};
