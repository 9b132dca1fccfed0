//! Text extraction for uploaded documents.
//!
//! PDFs go to an external extraction service. Plain-text uploads are decoded
//! locally with charset detection.

use std::time::Duration;

use async_trait::async_trait;
use chardetng::EncodingDetector;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ExtractionConfig;
use crate::error::{GatewayError, Result};

/// bytes → text collaborator for PDF uploads.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, filename: &str, bytes: Vec<u8>) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ExtractionReply {
    text: String,
}

/// Posts the document as multipart `file` to an extraction endpoint. The
/// endpoint may answer `{"text": ...}` or a plain-text body.
pub struct HttpTextExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTextExtractor {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(cfg: &ExtractionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build extraction client: {e}")))?;
        Ok(Self::new(client, cfg.endpoint.clone()))
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    async fn extract(&self, filename: &str, bytes: Vec<u8>) -> Result<String> {
        let size = bytes.len();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .map_err(|e| GatewayError::Extraction(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| GatewayError::Extraction(format!("PDF 처리 중 오류가 발생했습니다: {e}")))?;
        let status = resp.status();
        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        let body = resp
            .text()
            .await
            .map_err(|e| GatewayError::Extraction(e.to_string()))?;
        if !status.is_success() {
            return Err(GatewayError::Extraction(format!(
                "extraction service returned {status}: {body}"
            )));
        }

        let text = if is_json {
            serde_json::from_str::<ExtractionReply>(&body)
                .map_err(|e| GatewayError::Extraction(format!("invalid extraction reply: {e}")))?
                .text
        } else {
            body
        };
        info!(bytes = size, chars = text.chars().count(), "pdf text extracted");
        ensure_text(text)
    }
}

/// Decode an uploaded text file, guessing its charset (UTF-8, EUC-KR, ...).
/// Undecodable sequences become U+FFFD.
pub fn decode_text(bytes: &[u8]) -> String {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    let (text, used, had_errors) = encoding.decode(bytes);
    debug!(encoding = used.name(), had_errors, "decoded text upload");
    text.into_owned()
}

/// Reject documents without any extractable text.
pub fn ensure_text(text: String) -> Result<String> {
    if text.trim().is_empty() {
        return Err(GatewayError::InvalidInput(
            "문서에서 텍스트를 추출할 수 없습니다.".into(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf8_and_euc_kr() {
        assert_eq!(decode_text("약사법 시행규칙".as_bytes()), "약사법 시행규칙");

        let notice = "약사법 시행규칙 일부개정령을 다음과 같이 공포합니다. 이 규칙은 공포한 날부터 시행합니다. 약국개설자는 의약품을 판매할 때 복약지도를 하여야 합니다.";
        let (euc_kr, _, _) = encoding_rs::EUC_KR.encode(notice);
        assert_eq!(decode_text(&euc_kr), notice);
    }

    #[test]
    fn blank_text_is_an_input_error() {
        assert!(matches!(
            ensure_text(" \n\t".into()),
            Err(GatewayError::InvalidInput(_))
        ));
        assert_eq!(ensure_text("본문".into()).unwrap(), "본문");
    }
}
