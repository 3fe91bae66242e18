//! Ingestion pipeline: stage runner, orchestrator, and the scoring heuristics they apply.

pub mod keywords;
mod service;
mod stages;
pub mod stopwords;
pub mod summarize;
pub mod tokenize;
pub mod types;

pub use keywords::KeywordExtractor;
pub use service::{CancelHandle, CancelSignal, IngestionService, cancellation};
pub use stages::StageRunner;
pub use summarize::Summarizer;
pub use types::{
    FailedDocument, PipelineError, PipelineOptions, RunReport, Stage, StageFailure,
    StoredDocument,
};
