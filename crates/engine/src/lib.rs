//! Analysis orchestration: fetches history, runs the impact, funnel and
//! prediction pipelines for each event, and aggregates batch results.

pub mod cache;
pub mod orchestrator;
pub mod report;
pub mod source;

pub use cache::ReferenceCache;
pub use orchestrator::AnalysisOrchestrator;
pub use report::{AnalysisStatus, BatchReport, BatchSummary, EventAnalysis};
pub use source::{read_json, EventConversions, HistoricalSource, InMemorySource};
