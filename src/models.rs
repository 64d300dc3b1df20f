use serde::{Deserialize, Serialize};

/// One uploaded document part. Transient: owned by the single report
/// invocation that received it and dropped when the response is sent.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Which guideline set drives prompt assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criteria {
    Aua,
    Nccn,
}

impl Criteria {
    /// Parse the `criteria` query parameter. Only the exact (case-insensitive)
    /// value `aua` selects AUA; anything else, including absence, is NCCN.
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw.map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("aua") => Criteria::Aua,
            _ => Criteria::Nccn,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Criteria::Aua => "AUA",
            Criteria::Nccn => "NCCN",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub criteria: Option<String>,
}

/// Per-part OCR output echoed back to the client alongside the report.
#[derive(Debug, Serialize)]
pub struct FileResult {
    pub file: String,
    pub output: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub markdown_report: String,
    pub results: Vec<FileResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub report_context: Option<String>,
    #[serde(default)]
    pub redacted_text_context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}
