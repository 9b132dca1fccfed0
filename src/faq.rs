//! Retrieval-augmented FAQ assistant.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use crate::config::FaqConfig;
use crate::error::{GatewayError, Result};
use crate::knowledge::{FaqEntry, KnowledgeBase, Retriever};
use crate::llm::{complete_text, CompletionOptions, LanguageModel};
use crate::message::{extend_history, HistoryEntry, Speaker};
use crate::prompts::{faq_user_prompt, FAQ_SYSTEM_PROMPT};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaqAnswer {
    pub answer: String,
    pub history: Vec<HistoryEntry>,
}

/// Read a JSON array of `{question, answer}` items.
pub fn load_corpus(path: impl AsRef<Path>) -> Result<Vec<FaqEntry>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::Config(format!("failed to read FAQ corpus {}: {e}", path.display()))
    })?;
    let entries: Vec<FaqEntry> = serde_json::from_str(&raw)?;
    Ok(entries)
}

/// Fold a flat history into (person, ai) pairs. A person turn waits for the
/// next ai turn; a person turn followed by another person turn is replaced,
/// and ai turns with nothing pending are dropped. Unknown speakers are
/// ignored.
pub fn fold_pairs(history: &[HistoryEntry]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut pending: Option<&str> = None;
    for entry in history {
        match entry.speaker {
            Speaker::Human | Speaker::User => pending = Some(entry.content.as_str()),
            Speaker::Ai => {
                if let Some(question) = pending.take() {
                    pairs.push((question.to_string(), entry.content.clone()));
                }
            }
            Speaker::Unknown => {}
        }
    }
    pairs
}

pub struct FaqBot<M: LanguageModel> {
    model: Arc<M>,
    retriever: Arc<dyn Retriever>,
    top_k: usize,
    temperature: f32,
}

impl<M: LanguageModel> FaqBot<M> {
    pub fn new(model: Arc<M>, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            model,
            retriever,
            top_k: 3,
            temperature: 0.0,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Build the bot from configuration. No corpus path means an empty index.
    pub async fn from_config(model: Arc<M>, cfg: &FaqConfig) -> Result<Self> {
        let entries = match &cfg.corpus_path {
            Some(path) => load_corpus(path)?,
            None => Vec::new(),
        };
        info!(entries = entries.len(), "FAQ corpus indexed");
        let kb = KnowledgeBase::from_entries(entries).await?;
        Ok(Self::new(model, Arc::new(kb))
            .with_top_k(cfg.top_k)
            .with_temperature(cfg.temperature))
    }

    #[instrument(skip_all, fields(history = history.len()))]
    pub async fn answer(&self, question: &str, history: &[HistoryEntry]) -> Result<FaqAnswer> {
        let snippets = self.retriever.retrieve(question, self.top_k).await?;
        let pairs = fold_pairs(history);
        let answer = complete_text(
            self.model.as_ref(),
            FAQ_SYSTEM_PROMPT,
            &faq_user_prompt(&snippets, &pairs, question),
            CompletionOptions::default().with_temperature(self.temperature),
        )
        .await?;
        info!(snippets = snippets.len(), "FAQ answered");
        Ok(FaqAnswer {
            history: extend_history(history, Speaker::User, question, &answer),
            answer,
        })
    }
}
