pub mod assemble;
pub mod chat;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod report;

pub use llm::{ChatMessage, LlmClient};
pub use ocr::OcrClient;
