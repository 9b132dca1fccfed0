use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use yeahyak_gateway::{
    router, Agent, AnswerPostProcessor, FaqBot, FaqEntry, GatewayError, GatewayState,
    KnowledgeBase, ServerConfig, StubModel, Summarizer, TextExtractor, ToolRegistry,
};

const BOUNDARY: &str = "yeahyak-test-boundary";

/// Extractor double that counts calls and can be told to fail.
struct CountingExtractor {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingExtractor {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextExtractor for CountingExtractor {
    async fn extract(&self, _filename: &str, _bytes: Vec<u8>) -> yeahyak_gateway::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(GatewayError::Extraction("connection refused".into()));
        }
        Ok("2024년 37주차 감염병 발생 현황 보고서".into())
    }
}

async fn app(model: Arc<StubModel>, extractor: Arc<CountingExtractor>) -> Router {
    let agent = Agent::new(model.clone(), Arc::new(ToolRegistry::new()))
        .with_post_processor(AnswerPostProcessor::default());
    let kb = KnowledgeBase::from_entries(vec![FaqEntry {
        question: "반품 기한은 어떻게 되나요?".into(),
        answer: "수령 후 7일 이내 반품 가능합니다.".into(),
    }])
    .await
    .unwrap();
    let faq = FaqBot::new(model.clone(), Arc::new(kb));
    let state = GatewayState::new(agent, Summarizer::new(model), faq, extractor);
    router(state, &ServerConfig::default())
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload_request(uri: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_check() {
    let app = app(StubModel::new(vec![]), CountingExtractor::new(false)).await;
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn qna_rejects_blank_query_without_inference() {
    let model = StubModel::new(vec![]);
    let app = app(model.clone(), CountingExtractor::new(false)).await;

    let (status, body) = send(app, json_request("/chat/qna", json!({"query": "  "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "query가 비어있습니다."}));
    assert_eq!(model.request_count(), 0);
}

#[tokio::test]
async fn qna_returns_reply_and_extended_history() {
    let model = StubModel::new(vec![json!({"action": "respond", "content": "해열 진통제입니다."}).to_string()]);
    let app = app(model, CountingExtractor::new(false)).await;

    let (status, body) = send(
        app,
        json_request(
            "/chat/qna",
            json!({
                "query": "타이레놀 효능은?",
                "history": [
                    {"type": "human", "content": "안녕하세요"},
                    {"type": "ai", "content": "무엇을 도와드릴까요?"}
                ]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "해열 진통제입니다.");
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[2], json!({"type": "human", "content": "타이레놀 효능은?"}));
    assert_eq!(history[3], json!({"type": "ai", "content": "해열 진통제입니다."}));
    assert!(body.get("degraded").is_none());
}

#[tokio::test]
async fn qna_skips_unknown_history_speakers() {
    let model = StubModel::new(vec![json!({"action": "respond", "content": "식후에 복용하세요."}).to_string()]);
    let app = app(model.clone(), CountingExtractor::new(false)).await;

    let (status, body) = send(
        app,
        json_request(
            "/chat/qna",
            json!({
                "query": "복용 시점은?",
                "history": [
                    {"type": "system", "content": "세션 시작"},
                    {"type": "human", "content": "타이레놀 효능은?"},
                    {"type": "ai", "content": "해열 진통제입니다."}
                ]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0], json!({"type": "human", "content": "타이레놀 효능은?"}));
    assert!(history.iter().all(|entry| entry["content"] != "세션 시작"));

    let transcript = &model.requests()[0];
    assert!(transcript.iter().all(|m| m.content != "세션 시작"));
}

#[tokio::test]
async fn qna_upstream_failure_is_bad_gateway() {
    let model = StubModel::new(vec![json!({"action": "fail", "error": "rate limited"}).to_string()]);
    let app = app(model, CountingExtractor::new(false)).await;

    let (status, body) = send(app, json_request("/chat/qna", json!({"query": "질문"}))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("rate limited"));
}

#[tokio::test]
async fn wrong_extension_is_rejected_before_extraction() {
    let model = StubModel::new(vec![]);
    let extractor = CountingExtractor::new(false);
    let app = app(model.clone(), extractor.clone()).await;

    let (status, body) = send(
        app,
        upload_request("/summarize/epidemic", "report.docx", b"not a pdf"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"success": false, "data": null, "error": "PDF 파일을 업로드 해주세요."})
    );
    assert_eq!(extractor.calls(), 0);
    assert_eq!(model.request_count(), 0);
}

#[tokio::test]
async fn law_route_requires_txt() {
    let model = StubModel::new(vec![]);
    let app = app(model.clone(), CountingExtractor::new(false)).await;

    let (status, body) = send(app, upload_request("/summarize/law", "law.pdf", b"%PDF-1.4")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "TXT 파일을 업로드 해주세요.");
    assert_eq!(model.request_count(), 0);
}

#[tokio::test]
async fn epidemic_summary_envelope() {
    let model = StubModel::new(vec![
        "A형 간염 환자 증가".into(),
        "<div><p>손 씻기를 안내해 주세요.</p></div>".into(),
    ]);
    let extractor = CountingExtractor::new(false);
    let app = app(model.clone(), extractor.clone()).await;

    let (status, body) = send(
        app,
        upload_request("/summarize/epidemic", "Weekly.PDF", b"%PDF-1.4 fake"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["summary"], "A형 간염 환자 증가");
    assert_eq!(
        body["data"]["notice"],
        "<h2>감염병 주간 공지</h2>\n<p>손 씻기를 안내해 주세요.</p>"
    );
    assert_eq!(extractor.calls(), 1);
    assert_eq!(model.request_count(), 2);
}

#[tokio::test]
async fn law_summary_decodes_text_upload() {
    let model = StubModel::new(vec!["<h2>약사법 개정</h2><p>복약지도 의무 강화</p>".into()]);
    let app = app(model.clone(), CountingExtractor::new(false)).await;

    let (status, body) = send(
        app,
        upload_request("/summarize/law", "amendment.txt", "약사법 시행규칙 일부개정".as_bytes()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["summary"],
        "<h2>약사법 개정</h2><p>복약지도 의무 강화</p>"
    );
    assert_eq!(model.requests()[0][1].content, "약사법 시행규칙 일부개정");
}

#[tokio::test]
async fn extraction_failure_is_internal_error() {
    let model = StubModel::new(vec![]);
    let app = app(model.clone(), CountingExtractor::new(true)).await;

    let (status, body) = send(
        app,
        upload_request("/summarize/new-product", "leaflet.pdf", b"%PDF-1.4"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(model.request_count(), 0);
}

#[tokio::test]
async fn faq_requires_question() {
    let app = app(StubModel::new(vec![]), CountingExtractor::new(false)).await;

    let (status, body) = send(app, json_request("/chat/faq", json!({"history": []}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "질문이 없습니다.");
}

#[tokio::test]
async fn faq_answers_with_retrieved_context() {
    let model = StubModel::new(vec!["수령 후 7일 이내 반품 가능합니다.".into()]);
    let app = app(model.clone(), CountingExtractor::new(false)).await;

    let (status, body) = send(
        app,
        json_request("/chat/faq", json!({"question": "반품 기한 알려주세요"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["answer"], "수령 후 7일 이내 반품 가능합니다.");
    assert_eq!(body["data"]["history"][0]["type"], "user");
    assert_eq!(body["data"]["history"][1]["type"], "ai");
    assert!(model.requests()[0][1].content.contains("Q: 반품 기한은 어떻게 되나요?"));
}
