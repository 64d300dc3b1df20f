//! Prompt assembly: pure string construction from extracted text and the
//! guideline store. No side effects, no outbound calls.

use once_cell::sync::Lazy;
use regex::Regex;

use super::llm::ChatMessage;
use crate::guidelines::GuidelineStore;
use crate::models::Criteria;

const AUA_SYSTEM_PREAMBLE: &str = "You are a medical pathology assistant who generates clear, \
     referenced markdown reports based on pathology report text and guideline data.";

/// Trigger phrases for the staging-priority override. Whole-word,
/// case-insensitive; "no CIS" still matches, which is intentional — the
/// override is a textual instruction to the model, and the model is told to
/// weigh the surrounding negation itself.
static STAGING_TRIGGERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(carcinoma in situ|CIS|Tis|flat high-grade lesion)\b").unwrap()
});

/// Whether the extracted text mentions carcinoma in situ in any of its
/// spellings.
pub fn staging_override_applies(raw_text: &str) -> bool {
    STAGING_TRIGGERS.is_match(raw_text)
}

/// Build the ordered message sequence for one report generation.
pub fn assemble_report_messages(
    criteria: Criteria,
    raw_text: &str,
    store: &GuidelineStore,
) -> Vec<ChatMessage> {
    match criteria {
        Criteria::Aua => assemble_aua_messages(raw_text, store),
        Criteria::Nccn => assemble_nccn_messages(raw_text, store),
    }
}

/// AUA variant: the extracted text followed by the risk block, the guideline
/// statements, and the fixed report rules, all in one user message.
fn assemble_aua_messages(raw_text: &str, store: &GuidelineStore) -> Vec<ChatMessage> {
    let cfg = &store.prompts;
    let instructions = format!(
        "Based on the **AUA** risk-stratification information below, classify the pathology \
         report text above and produce a markdown report.\n\n\
         {}\n\n\
         ---\n\n\
         {}\n\n\
         ---\n\n\
         {}\n\n\
         {}",
        cfg.aua, cfg.guideline_statements, cfg.report_instructions.general,
        cfg.report_instructions.structure
    );

    vec![
        ChatMessage::system(AUA_SYSTEM_PREAMBLE),
        ChatMessage::user(format!("{raw_text}\n\n{instructions}")),
    ]
}

/// NCCN variant: one system message holding the full report-writing task with
/// the raw report delimited inside `<<< >>>` markers, plus a named assistant
/// message carrying the serialized decision graph.
fn assemble_nccn_messages(raw_text: &str, store: &GuidelineStore) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(make_nccn_report_prompt(raw_text, store)),
        ChatMessage::assistant_named("nccn_graph", store.nccn_graph_json()),
    ]
}

fn make_nccn_report_prompt(raw_text: &str, store: &GuidelineStore) -> String {
    let rules = &store.prompts.report_instructions;

    let mut general = rules.general.clone();
    if staging_override_applies(raw_text) {
        general.push_str(
            "\n- **Staging-priority override:** The report text mentions carcinoma in situ \
             (CIS / Tis) or a flat high-grade lesion. In the Diagnosis section, force the \
             pathological stage label to (**Tis**), regardless of any co-mentioned lower \
             stage such as Ta or T1, unless the text explicitly negates the finding.",
        );
    }

    format!(
        "You are an oncology decision-support LLM.\n\n\
         Context\n\
         -------\n\
         - **raw_report**: delimited below.\n\
         - **nccn_graph**: supplied as a separate assistant message containing the full JSON \
         decision tree (BL-2 through BL-6, BL-E-1 through BL-E-3).\n\n\
         Task\n\
         ----\n\
         1. Read *raw_report* and infer the patient facts needed to walk the graph (stage, \
         histologic grade, CIS presence, tumour size, multifocality, etc.).\n\
         2. Traverse the NCCN graph, starting at **BL-2.initial** unless the report already \
         indicates Stage II or higher. Follow `next`, `options`, and `link` pointers until \
         you land on an **endpoint** with no further link.\n\
         3. Produce a markdown report using **exactly** the structure below.\n\n\
         {general}\n\n\
         {structure}\n\n\
         Additional NCCN rules\n\
         ---------------------\n\
         - If follow-up is recommended, insert the full, relevant follow-up bullet points \
         from the `followup` section of the endpoint, not just a reference to BL-E.\n\
         - For high-risk, BCG-unresponsive or BCG-intolerant disease with CIS, include the \
         systemic / novel-agent option (\"Pembrolizumab OR Nadofaragene firadenovec-vncg OR \
         Nogapendekin alfa inbakicept-pmln + BCG - select patients\") verbatim.\n\
         - If the case is high-risk **and** CIS is present **and** `bcg_status` is unknown, \
         traverse the `unresponsive_or_intolerant` branch.\n\n\
         raw_report:\n\
         <<<\n\
         {raw}\n\
         >>>",
        general = general,
        structure = rules.structure,
        raw = raw_text.trim(),
    )
}
