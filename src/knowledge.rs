use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;

/// One question/answer pair of the FAQ corpus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

impl FaqEntry {
    /// Text fed to the model as a retrieval snippet.
    pub fn snippet(&self) -> String {
        format!("Q: {} A: {}", self.question.trim(), self.answer.trim())
    }
}

#[derive(Clone, Debug)]
pub struct ScoredEntry {
    pub entry: FaqEntry,
    pub score: f32,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, entry: FaqEntry, embedding: Vec<f32>) -> Result<()>;
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredEntry>>;
}

/// Hashed character-bigram embedding. Works for Hangul without a tokenizer:
/// `영업시간` and `영업 시간` share most bigrams.
pub struct BigramEmbedder {
    buckets: usize,
}

impl Default for BigramEmbedder {
    fn default() -> Self {
        Self { buckets: 512 }
    }
}

impl BigramEmbedder {
    pub fn new(buckets: usize) -> Self {
        Self {
            buckets: buckets.max(1),
        }
    }

    fn bucket(&self, gram: &[char]) -> usize {
        let mut hasher = DefaultHasher::new();
        gram.hash(&mut hasher);
        (hasher.finish() as usize) % self.buckets
    }
}

#[async_trait]
impl Embedder for BigramEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; self.buckets];
        for word in text.to_lowercase().split_whitespace() {
            let chars: Vec<char> = word.chars().filter(|c| c.is_alphanumeric()).collect();
            match chars.len() {
                0 => {}
                1 => vector[self.bucket(&chars)] += 1.0,
                _ => {
                    for gram in chars.windows(2) {
                        vector[self.bucket(gram)] += 1.0;
                    }
                }
            }
        }
        Ok(vector)
    }
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<(FaqEntry, Vec<f32>)>>,
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, entry: FaqEntry, embedding: Vec<f32>) -> Result<()> {
        self.entries.write().await.push((entry, embedding));
        Ok(())
    }

    /// Best matches first; entries with no overlap at all are skipped.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredEntry>> {
        let entries = self.entries.read().await;
        let mut scored: Vec<ScoredEntry> = entries
            .iter()
            .map(|(entry, stored)| ScoredEntry {
                entry: entry.clone(),
                score: cosine_similarity(stored, embedding),
            })
            .filter(|s| s.score > 0.0)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

/// Snippet lookup used by the FAQ bot.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>>;
}

pub struct KnowledgeBase<E: Embedder, S: VectorStore> {
    embedder: Arc<E>,
    store: Arc<S>,
}

impl<E: Embedder, S: VectorStore> KnowledgeBase<E, S> {
    pub fn new(embedder: Arc<E>, store: Arc<S>) -> Self {
        Self { embedder, store }
    }

    pub async fn add_entry(&self, entry: FaqEntry) -> Result<()> {
        // Index on the question and answer together.
        let embedding = self
            .embedder
            .embed(&format!("{} {}", entry.question, entry.answer))
            .await?;
        self.store.add(entry, embedding).await
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredEntry>> {
        let embedding = self.embedder.embed(query).await?;
        self.store.search(&embedding, top_k).await
    }
}

impl KnowledgeBase<BigramEmbedder, InMemoryVectorStore> {
    /// In-memory index over `entries`.
    pub async fn from_entries(entries: Vec<FaqEntry>) -> Result<Self> {
        let kb = Self::new(
            Arc::new(BigramEmbedder::default()),
            Arc::new(InMemoryVectorStore::default()),
        );
        for entry in entries {
            kb.add_entry(entry).await?;
        }
        Ok(kb)
    }
}

#[async_trait]
impl<E, S> Retriever for KnowledgeBase<E, S>
where
    E: Embedder,
    S: VectorStore,
{
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        let hits = self.search(query, top_k).await?;
        Ok(hits.into_iter().map(|h| h.entry.snippet()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(question: &str, answer: &str) -> FaqEntry {
        FaqEntry {
            question: question.into(),
            answer: answer.into(),
        }
    }

    #[tokio::test]
    async fn retrieves_closest_entry_first() {
        let kb = KnowledgeBase::from_entries(vec![
            entry("반품 기한은 어떻게 되나요?", "수령 후 7일 이내 반품 가능합니다."),
            entry("영업시간 변경은 어떻게 하나요?", "본사 승인 후 변경할 수 있습니다."),
            entry("POS 오류 문의처", "전산팀 내선 1234로 연락하세요."),
        ])
        .await
        .unwrap();

        let hits = kb.search("영업 시간을 바꾸고 싶어요", 2).await.unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].entry.question, "영업시간 변경은 어떻게 하나요?");
        assert!(hits.len() <= 2);
    }

    #[tokio::test]
    async fn empty_corpus_returns_nothing() {
        let kb = KnowledgeBase::from_entries(Vec::new()).await.unwrap();
        assert!(Retriever::retrieve(&kb, "아무 질문", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let embedder = BigramEmbedder::new(64);
        let a = embedder.embed("와파린 복용").await.unwrap();
        let b = embedder.embed("와파린 복용").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(cosine_similarity(&a, &b).round(), 1.0);
    }
}
