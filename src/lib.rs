pub mod error;
pub mod guidelines;
pub mod models;
pub mod pipeline;
pub mod service;

// Re-export commonly used types
pub use error::{PipelineError, Result};
pub use guidelines::GuidelineStore;
pub use models::*;
pub use service::{AppState, create_app};
