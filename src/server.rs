use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::agent::Agent;
use crate::config::{AppConfig, ServerConfig};
use crate::error::{GatewayError, Result};
use crate::extract::{decode_text, ensure_text, HttpTextExtractor, TextExtractor};
use crate::faq::FaqBot;
use crate::guardrails::AnswerPostProcessor;
use crate::llm::{CompletionOptions, LanguageModel};
use crate::message::{extend_history, HistoryEntry, Speaker};
use crate::prompts::QNA_SYSTEM_PROMPT;
use crate::summarize::{DocumentKind, DocumentSummary, EpidemicSummary, Summarizer};
use crate::tools::lookup_toolkit;

/// Everything a request handler needs. Built once at startup, shared read-only.
pub struct GatewayState<M: LanguageModel + 'static> {
    pub agent: Arc<Agent<M>>,
    pub summarizer: Arc<Summarizer<M>>,
    pub faq: Arc<FaqBot<M>>,
    pub extractor: Arc<dyn TextExtractor>,
}

impl<M: LanguageModel + 'static> Clone for GatewayState<M> {
    fn clone(&self) -> Self {
        Self {
            agent: Arc::clone(&self.agent),
            summarizer: Arc::clone(&self.summarizer),
            faq: Arc::clone(&self.faq),
            extractor: Arc::clone(&self.extractor),
        }
    }
}

impl<M: LanguageModel + 'static> GatewayState<M> {
    pub fn new(
        agent: Agent<M>,
        summarizer: Summarizer<M>,
        faq: FaqBot<M>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            agent: Arc::new(agent),
            summarizer: Arc::new(summarizer),
            faq: Arc::new(faq),
            extractor,
        }
    }

    /// Wire the agent, lookup tools, summarizers, FAQ index and extractor
    /// from configuration around one shared model client.
    pub async fn from_config(model: Arc<M>, cfg: &AppConfig) -> Result<Self> {
        let tools = lookup_toolkit(&cfg.lookup)?;
        info!(tools = ?tools.names(), "lookup tools registered");
        let agent = Agent::new(Arc::clone(&model), Arc::new(tools))
            .with_system_prompt(QNA_SYSTEM_PROMPT)
            .with_max_rounds(cfg.agent.max_rounds)
            .with_options(CompletionOptions::default().with_temperature(cfg.agent.temperature))
            .with_post_processor(AnswerPostProcessor::from_config(&cfg.guardrails));
        let faq = FaqBot::from_config(Arc::clone(&model), &cfg.faq).await?;
        let extractor = HttpTextExtractor::from_config(&cfg.extraction)?;
        Ok(Self::new(
            agent,
            Summarizer::new(model),
            faq,
            Arc::new(extractor),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────────────────────────

/// `{success, data, error}` wrapper used by every route except QnA.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(%status, error = %self, "request failed");
        }
        let body = Envelope::<()> {
            success: false,
            data: None,
            error: Some(self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

/// QnA errors keep the bare `{error}` shape.
pub struct QnaError(GatewayError);

impl From<GatewayError> for QnaError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for QnaError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            warn!(%status, error = %self.0, "qna request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat routes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QnaRequest {
    #[serde(default, alias = "question")]
    pub query: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct QnaResponse {
    pub reply: String,
    pub history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

fn non_blank(value: Option<String>, message: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GatewayError::InvalidInput(message.to_string()))
}

fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(inner)| inner)
        .map_err(|rejection| GatewayError::InvalidInput(rejection.body_text()))
}

#[instrument(skip_all)]
async fn qna<M: LanguageModel + 'static>(
    State(state): State<GatewayState<M>>,
    body: std::result::Result<Json<QnaRequest>, JsonRejection>,
) -> std::result::Result<Json<QnaResponse>, QnaError> {
    let req = json_body(body)?;
    let query = non_blank(req.query, "query가 비어있습니다.")?;

    let reply = state.agent.respond(&req.history, &query).await?;
    Ok(Json(QnaResponse {
        history: extend_history(&req.history, Speaker::Human, &query, &reply.answer),
        reply: reply.answer,
        degraded: reply.degraded,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FaqRequest {
    #[serde(default, alias = "query")]
    pub question: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[instrument(skip_all)]
async fn faq<M: LanguageModel + 'static>(
    State(state): State<GatewayState<M>>,
    body: std::result::Result<Json<FaqRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let req = json_body(body)?;
    let question = non_blank(req.question, "질문이 없습니다.")?;
    let answer = state.faq.answer(&question, &req.history).await?;
    Ok(Envelope::ok(answer))
}

// ─────────────────────────────────────────────────────────────────────────────
// Upload routes
// ─────────────────────────────────────────────────────────────────────────────

/// Lowercase extension check, done before any bytes reach a collaborator.
pub fn has_extension(filename: &str, extension: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case(extension))
}

/// Pull the `file` field out of a multipart upload and validate it.
async fn read_upload(
    multipart: std::result::Result<Multipart, MultipartRejection>,
    kind: DocumentKind,
) -> Result<(String, Vec<u8>)> {
    let mut multipart =
        multipart.map_err(|_| GatewayError::InvalidInput(kind.upload_hint().to_string()))?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::InvalidInput(format!("업로드를 읽을 수 없습니다: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if !has_extension(&filename, kind.extension()) {
            return Err(GatewayError::InvalidInput(kind.upload_hint().to_string()));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| GatewayError::InvalidInput(format!("업로드를 읽을 수 없습니다: {e}")))?;
        if bytes.is_empty() {
            return Err(GatewayError::InvalidInput("빈 파일입니다.".into()));
        }
        info!(filename = %filename, bytes = bytes.len(), "upload received");
        return Ok((filename, bytes.to_vec()));
    }
    Err(GatewayError::InvalidInput(kind.upload_hint().to_string()))
}

#[instrument(skip_all)]
async fn summarize_epidemic<M: LanguageModel + 'static>(
    State(state): State<GatewayState<M>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<EpidemicSummary>>> {
    let (filename, bytes) = read_upload(multipart, DocumentKind::Epidemic).await?;
    let text = state.extractor.extract(&filename, bytes).await?;
    let summary = state.summarizer.epidemic(&text).await?;
    Ok(Envelope::ok(summary))
}

#[instrument(skip_all)]
async fn summarize_law<M: LanguageModel + 'static>(
    State(state): State<GatewayState<M>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<DocumentSummary>>> {
    let (_, bytes) = read_upload(multipart, DocumentKind::Law).await?;
    let text = ensure_text(decode_text(&bytes))?;
    let summary = state.summarizer.law(&text).await?;
    Ok(Envelope::ok(summary))
}

#[instrument(skip_all)]
async fn summarize_new_product<M: LanguageModel + 'static>(
    State(state): State<GatewayState<M>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<DocumentSummary>>> {
    let (filename, bytes) = read_upload(multipart, DocumentKind::NewProduct).await?;
    let text = state.extractor.extract(&filename, bytes).await?;
    let summary = state.summarizer.new_product(&text).await?;
    Ok(Envelope::ok(summary))
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

pub fn router<M: LanguageModel + 'static>(state: GatewayState<M>, cfg: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/chat/qna", post(qna::<M>))
        .route("/chat/faq", post(faq::<M>))
        .route("/summarize/epidemic", post(summarize_epidemic::<M>))
        .route("/summarize/law", post(summarize_law::<M>))
        .route("/summarize/new-product", post(summarize_new_product::<M>))
        .layer(DefaultBodyLimit::max(cfg.max_upload_bytes))
        .layer(cors_layer(&cfg.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(app: Router, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gateway listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("failed to listen for shutdown signal");
            }
        })
        .await
        .map_err(|err| GatewayError::Protocol(format!("server error: {err}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(has_extension("report.PDF", "pdf"));
        assert!(has_extension("개정문.Txt", "txt"));
        assert!(!has_extension("report.pdf.exe", "pdf"));
        assert!(!has_extension("pdf", "pdf"));
        assert!(!has_extension(".pdf", "pdf"));
    }

    #[test]
    fn envelope_error_shape() {
        let response = GatewayError::InvalidInput("PDF 파일을 업로드 해주세요.".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn blank_values_are_rejected() {
        assert!(non_blank(Some("  ".into()), "비어있음").is_err());
        assert!(non_blank(None, "비어있음").is_err());
        assert_eq!(non_blank(Some(" 질문 ".into()), "x").unwrap(), "질문");
    }
}
