use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

const PROMPT_CONFIG_JSON: &str = include_str!("../data/bladder_guidelines_prompt.json");
const NCCN_GRAPH_JSON: &str = include_str!("../data/nccn_decision_graph.json");

/// Fixed report-formatting rules shipped with every report prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportRules {
    pub general: String,
    pub structure: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    pub aua: String,
    pub nccn: String,
    pub guideline_statements: String,
    pub report_instructions: ReportRules,
}

/// Clinical guideline data bundled at build time.
///
/// Loaded once at process start, shared read-only behind an `Arc` for the
/// process lifetime. The pipelines never mutate or re-fetch it.
#[derive(Debug)]
pub struct GuidelineStore {
    pub prompts: PromptConfig,
    nccn_graph: Value,
}

impl GuidelineStore {
    pub fn load() -> anyhow::Result<Self> {
        let prompts: PromptConfig = serde_json::from_str(PROMPT_CONFIG_JSON)
            .context("bladder_guidelines_prompt.json is not valid prompt configuration")?;
        let nccn_graph: Value = serde_json::from_str(NCCN_GRAPH_JSON)
            .context("nccn_decision_graph.json is not valid JSON")?;
        Ok(Self {
            prompts,
            nccn_graph,
        })
    }

    /// Serialized decision graph, shipped verbatim to the model as a
    /// dedicated context message.
    pub fn nccn_graph_json(&self) -> String {
        self.nccn_graph.to_string()
    }
}
