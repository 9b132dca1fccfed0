use axum::http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("tool `{0}` not found")]
    ToolNotFound(String),

    #[error("tool `{name}` invocation failed: {source}")]
    ToolInvocation {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("language model error: {0}")]
    LanguageModel(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl GatewayError {
    /// HTTP status a caller sees for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::LanguageModel(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(
            GatewayError::InvalidInput("query가 비어있습니다.".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::LanguageModel("timeout".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::Extraction("connection refused".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalid_input_displays_raw_message() {
        let err = GatewayError::InvalidInput("PDF 파일을 업로드 해주세요.".into());
        assert_eq!(err.to_string(), "PDF 파일을 업로드 해주세요.");
    }
}
