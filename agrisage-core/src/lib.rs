pub mod config;
pub mod db;
pub mod deletion;
pub mod error;
pub mod extract;
pub mod generation;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod storage;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AgrisageConfig;
pub use deletion::{DeletionCoordinator, DeletionReport};
pub use error::AgrisageError;
pub use extract::{extract_advisory, extract_diagnosis, AdvisoryOutcome, DiagnosisOutcome, ExtractError};
pub use generation::{
    GeminiClient, GenerationConfig, GenerationError, InlineImage, TextGenerator,
};
pub use models::{AdvisoryRecord, DiagnosticRecord, NewAdvisory, NewDiagnostic};
pub use pipeline::{
    AdvisoryInput, DiagnosisInput, Pipeline, PipelineError, PipelineRun, RunState,
};
pub use prompt::OutputLanguage;
pub use render::{advice_view, render, AdviceView, DisplayNode, MAX_RENDER_DEPTH};
pub use storage::{BlobError, BlobStore, BucketClient, BucketConfig};
pub use store::{PgRecordStore, RecordKind, RecordStore, StoreError};
