pub mod fallback;
pub mod orchestrator;
pub mod payload;
pub mod primary;

pub use orchestrator::{AnalysisOutcome, ReportOrchestrator};
