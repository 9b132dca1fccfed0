//! Document summarizers for the three upload routes.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use crate::html::sanitize_html;
use crate::llm::{complete_text, CompletionOptions, LanguageModel};
use crate::prompts;

/// Characters of a product leaflet handed to the model.
pub const NEW_PRODUCT_INPUT_CHARS: usize = 3000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpidemicSummary {
    pub summary: String,
    /// Restricted HTML.
    pub notice: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    /// Restricted HTML.
    pub summary: String,
}

/// Which upload a summary was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Epidemic,
    Law,
    NewProduct,
}

impl DocumentKind {
    /// Heading used when the model's HTML does not open with one.
    pub fn fallback_title(self) -> &'static str {
        match self {
            DocumentKind::Epidemic => "감염병 주간 공지",
            DocumentKind::Law => "법령 개정 안내",
            DocumentKind::NewProduct => "약품 요약",
        }
    }

    /// Required extension of the uploaded file.
    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::Epidemic | DocumentKind::NewProduct => "pdf",
            DocumentKind::Law => "txt",
        }
    }

    pub fn upload_hint(self) -> &'static str {
        match self {
            DocumentKind::Epidemic | DocumentKind::NewProduct => "PDF 파일을 업로드 해주세요.",
            DocumentKind::Law => "TXT 파일을 업로드 해주세요.",
        }
    }
}

pub struct Summarizer<M: LanguageModel> {
    model: Arc<M>,
}

impl<M: LanguageModel> Summarizer<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self { model }
    }

    /// Two sequential calls: a plain summary, then a notice built from it.
    #[instrument(skip_all, fields(chars = report.chars().count()))]
    pub async fn epidemic(&self, report: &str) -> crate::Result<EpidemicSummary> {
        let summary = complete_text(
            self.model.as_ref(),
            prompts::EPIDEMIC_SUMMARY_SYSTEM,
            &prompts::epidemic_summary_prompt(report),
            CompletionOptions::default(),
        )
        .await?;
        let notice = complete_text(
            self.model.as_ref(),
            prompts::EPIDEMIC_NOTICE_SYSTEM,
            &prompts::epidemic_notice_prompt(&summary),
            CompletionOptions::default(),
        )
        .await?;
        info!("epidemic notice generated");
        Ok(EpidemicSummary {
            summary,
            notice: sanitize_html(&notice, DocumentKind::Epidemic.fallback_title()),
        })
    }

    #[instrument(skip_all, fields(chars = text.chars().count()))]
    pub async fn law(&self, text: &str) -> crate::Result<DocumentSummary> {
        let raw = complete_text(
            self.model.as_ref(),
            &prompts::law_system_prompt(),
            text,
            CompletionOptions::default()
                .with_temperature(0.3)
                .with_max_tokens(10_000),
        )
        .await?;
        Ok(DocumentSummary {
            summary: sanitize_html(&raw, DocumentKind::Law.fallback_title()),
        })
    }

    #[instrument(skip_all, fields(chars = text.chars().count()))]
    pub async fn new_product(&self, text: &str) -> crate::Result<DocumentSummary> {
        let leaflet: String = text.chars().take(NEW_PRODUCT_INPUT_CHARS).collect();
        let raw = complete_text(
            self.model.as_ref(),
            prompts::NEW_PRODUCT_SYSTEM,
            &prompts::new_product_prompt(&leaflet),
            CompletionOptions::default().with_temperature(0.3),
        )
        .await?;
        Ok(DocumentSummary {
            summary: sanitize_html(&raw, DocumentKind::NewProduct.fallback_title()),
        })
    }
}
