use reqwest::multipart;
use serde::Deserialize;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::models::UploadedDocument;

/// Wire shape of the OCR service response. Validated at the boundary rather
/// than trusted: a missing `content` field deserializes to an empty string,
/// which is then rejected like any other empty extraction.
#[derive(Debug, Deserialize)]
struct OcrResponse {
    success: bool,
    #[serde(default)]
    content: String,
}

/// Client for the external OCR service (`POST {API_BASE_URL}/ocr/text`).
#[derive(Clone)]
pub struct OcrClient {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl OcrClient {
    /// Read `API_BASE_URL` from the environment. Absence is reported per
    /// request, not at startup, so a misconfigured process still serves
    /// `/health` and chat traffic.
    pub fn from_env() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: std::env::var("API_BASE_URL").ok(),
        }
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: Some(base_url.into()),
        }
    }

    /// Extract plain text from one uploaded document. One call, one outcome;
    /// no retry.
    pub async fn extract_text(&self, document: &UploadedDocument) -> Result<String> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or(PipelineError::MissingConfig("API_BASE_URL"))?;

        let part = multipart::Part::bytes(document.bytes.clone())
            .file_name(document.filename.clone())
            .mime_str(&document.content_type)
            .map_err(|e| PipelineError::Ocr(format!("Invalid content type: {e}")))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{base_url}/ocr/text"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::Ocr(format!("OCR request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::Ocr(format!(
                "OCR API failed ({})",
                response.status().as_u16()
            )));
        }

        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Ocr(format!("Invalid OCR response: {e}")))?;

        if !body.success {
            return Err(PipelineError::Ocr(
                "OCR service returned failure".to_string(),
            ));
        }
        if body.content.trim().is_empty() {
            return Err(PipelineError::Ocr("OCR returned empty content".to_string()));
        }

        info!(
            "OCR extracted {} characters from {}",
            body.content.len(),
            document.filename
        );
        Ok(body.content)
    }
}
