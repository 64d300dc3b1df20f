//! Report orchestrator: OCR -> prompt assembly -> LLM -> markdown cleanup.
//!
//! Linear, early-exit on error. No stage persists anything, so a failure
//! needs no rollback; the whole request simply fails.

use futures_util::future::try_join_all;
use tracing::info;
use uuid::Uuid;

use super::llm::LlmClient;
use super::ocr::OcrClient;
use super::{assemble, postprocess};
use crate::error::Result;
use crate::guidelines::GuidelineStore;
use crate::models::{Criteria, FileResult, ReportResponse, UploadedDocument};

const REPORT_MODEL: &str = "openai/gpt-4.1";
const REPORT_TEMPERATURE: f64 = 0.2;
const REPORT_MAX_TOKENS: u32 = 2048;

/// Run the full document-to-report pipeline for one request.
///
/// Each invocation owns its documents and builds a fresh message sequence;
/// the guideline store is the only shared input and is read-only.
pub async fn generate_report(
    ocr: &OcrClient,
    llm: &LlmClient,
    store: &GuidelineStore,
    criteria: Criteria,
    documents: Vec<UploadedDocument>,
) -> Result<ReportResponse> {
    let request_id = Uuid::new_v4();
    info!(
        %request_id,
        criteria = criteria.label(),
        parts = documents.len(),
        "starting report pipeline"
    );

    // One OCR call per uploaded part. Multi-image uploads fan out
    // concurrently and join in field order; the LLM call waits for all of
    // them.
    let texts = try_join_all(documents.iter().map(|doc| ocr.extract_text(doc))).await?;

    let raw_text = texts.join("\n\n");
    let results = documents
        .iter()
        .zip(&texts)
        .map(|(doc, output)| FileResult {
            file: doc.filename.clone(),
            output: output.clone(),
        })
        .collect();

    let messages = assemble::assemble_report_messages(criteria, &raw_text, store);
    let markdown = llm
        .complete(REPORT_MODEL, &messages, REPORT_TEMPERATURE, REPORT_MAX_TOKENS)
        .await?;

    let markdown_report = postprocess::strip_markdown_fences(&markdown);

    info!(%request_id, chars = markdown_report.len(), "report pipeline completed");
    Ok(ReportResponse {
        markdown_report,
        results,
    })
}
