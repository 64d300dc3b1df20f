//! Follow-up chat pipeline: answers a free-text question against two opaque
//! context strings (the generated report and the original extracted text).
//! Independent of the report pipeline; no guideline data, no OCR.

use rig::{agent::Agent, client::CompletionClient, completion::Prompt, providers::openrouter};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::models::ChatRequest;

const CHAT_MODEL: &str = "openai/gpt-4o";
const CHAT_TEMPERATURE: f64 = 0.2;
const CHAT_MAX_TOKENS: u64 = 500;

const CHAT_PREAMBLE: &str = "You are a helpful medical assistant. \
     You will be given two documents as context: a 'Generated Report' and the 'Original \
     Redacted Text'. Your primary task is to answer follow-up questions by synthesizing \
     information from *both* sources. Prioritize the 'Generated Report' for summarized \
     information but refer to the 'Original Redacted Text' for specific details or direct \
     quotes if necessary. Do not invent, infer, or assume any information not present in \
     the provided documents. Keep your answers concise. If the answer cannot be found in \
     either document, clearly state that the information is not available.";

const FALLBACK_RESPONSE: &str =
    "Sorry, I was unable to generate a response. Please try again.";

/// Reject requests that would waste an outbound call: an empty prompt, or no
/// context to answer from. Runs before any network I/O.
pub fn validate_chat_request(request: &ChatRequest) -> Result<()> {
    if request.prompt.trim().is_empty() {
        return Err(PipelineError::BadRequest(
            "Bad Request: 'prompt' is required in the request body.".to_string(),
        ));
    }

    let has_context = [&request.report_context, &request.redacted_text_context]
        .iter()
        .any(|context| context.as_deref().is_some_and(|s| !s.trim().is_empty()));
    if !has_context {
        return Err(PipelineError::BadRequest(
            "Bad Request: At least one context ('reportContext' or 'redactedTextContext') \
             is required."
                .to_string(),
        ));
    }

    Ok(())
}

/// Answer one follow-up question. Exactly one LLM call; the apology fallback
/// covers an empty completion.
pub async fn answer_question(request: &ChatRequest) -> Result<String> {
    let user_message = build_user_message(request);
    let agent = chat_agent()?;

    let answer = agent
        .prompt(&user_message)
        .await
        .map_err(|e| PipelineError::Llm(e.to_string()))?;

    info!("chat answer generated ({} characters)", answer.len());

    if answer.trim().is_empty() {
        Ok(FALLBACK_RESPONSE.to_string())
    } else {
        Ok(answer)
    }
}

fn chat_agent() -> Result<Agent<openrouter::CompletionModel>> {
    let api_key = std::env::var("OPENROUTER_API_KEY")
        .map_err(|_| PipelineError::MissingConfig("OPENROUTER_API_KEY"))?;
    let client = openrouter::Client::new(&api_key);
    Ok(client
        .agent(CHAT_MODEL)
        .preamble(CHAT_PREAMBLE)
        .temperature(CHAT_TEMPERATURE)
        .max_tokens(CHAT_MAX_TOKENS)
        .build())
}

fn build_user_message(request: &ChatRequest) -> String {
    let report = request
        .report_context
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("No summary was provided.");
    let redacted = request
        .redacted_text_context
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("No original text was provided.");

    format!(
        "CONTEXT 1: Generated Report\n\
         ---\n\
         {report}\n\
         ---\n\n\
         CONTEXT 2: Original Redacted Text\n\
         ---\n\
         {redacted}\n\
         ---\n\n\
         Based on the two documents provided above, please answer the following question:\n\
         \"{prompt}\"",
        prompt = request.prompt.trim(),
    )
}
