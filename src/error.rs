use axum::http::StatusCode;
use thiserror::Error;

/// Failure modes of the report and chat pipelines.
///
/// Every variant is terminal for the current request; the caller retries by
/// resubmitting. `BadRequest` is the only client-side (4xx) variant.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0} environment variable not set")]
    MissingConfig(&'static str),

    #[error("{0}")]
    Ocr(String),

    #[error("LLM generation failed: {0}")]
    Llm(String),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::BadRequest(_) => StatusCode::BAD_REQUEST,
            PipelineError::MissingConfig(_) | PipelineError::Ocr(_) | PipelineError::Llm(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let err = PipelineError::BadRequest("No file uploaded.".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "No file uploaded.");
    }

    #[test]
    fn upstream_failures_map_to_500() {
        for err in [
            PipelineError::MissingConfig("API_BASE_URL"),
            PipelineError::Ocr("OCR API failed (502)".to_string()),
            PipelineError::Llm("connection refused".to_string()),
        ] {
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
