//! Generation Pipeline — prompt, generate, extract, persist.
//!
//! Each request walks `Idle → Requesting → Extracting → Persisting →
//! Succeeded | Failed`. A run is a saga over two independent stores, not a
//! transaction: for diagnostics the blob is uploaded strictly before the row
//! is inserted, so no row is ever observable without its blob. A row-insert
//! failure after a successful upload leaves the blob orphaned; the leaked
//! key is logged and the run fails. Nothing is retried automatically — a
//! failed run requires the user to resubmit.

use crate::extract::{self, ExtractError};
use crate::generation::{GenerationError, InlineImage, TextGenerator};
use crate::models::{AdvisoryRecord, DiagnosticRecord, NewAdvisory, NewDiagnostic};
use crate::prompt::{self, OutputLanguage};
use crate::storage::{self, BlobError, BlobStore};
use crate::store::{RecordStore, StoreError};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Malformed(#[from] ExtractError),

    #[error(transparent)]
    BlobWrite(#[from] BlobError),

    #[error(transparent)]
    StoreWrite(#[from] StoreError),
}

impl PipelineError {
    /// Single user-visible message; no internal error crosses the boundary
    /// uncaught. Configuration problems read differently from runtime
    /// failures so a misconfigured deployment is recognizable.
    pub fn user_message(&self) -> String {
        match self {
            Self::Generation(GenerationError::MissingApiKey) => {
                "Generation API key is not configured.".to_string()
            }
            Self::Generation(_) => {
                "The AI advisory service failed. Please try again.".to_string()
            }
            Self::Malformed(_) => {
                "Received an invalid response from the AI service.".to_string()
            }
            Self::BlobWrite(BlobError::MissingCredential) => {
                "Storage credentials are not configured.".to_string()
            }
            Self::BlobWrite(_) => "Failed to store the diagnosis image.".to_string(),
            Self::StoreWrite(_) => "Failed to save the result.".to_string(),
        }
    }
}

/// Observable per-run state, also emitted as tracing events so partial runs
/// are auditable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Requesting,
    Extracting,
    Persisting,
    Succeeded,
    Failed,
}

/// Outcome of one pipeline run plus the ordered states it visited.
#[derive(Debug)]
pub struct PipelineRun<T> {
    pub run_id: Uuid,
    pub outcome: Result<T, PipelineError>,
    pub states: Vec<RunState>,
}

#[derive(Debug, Clone)]
pub struct AdvisoryInput {
    pub owner: Uuid,
    pub crop: String,
    pub location: String,
    pub season: String,
    pub language: OutputLanguage,
}

#[derive(Debug, Clone)]
pub struct DiagnosisInput {
    pub owner: Uuid,
    pub image: Vec<u8>,
    pub content_type: String,
    pub file_ext: String,
    pub language: OutputLanguage,
}

struct Trace {
    run_id: Uuid,
    states: Vec<RunState>,
}

impl Trace {
    fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            states: vec![RunState::Idle],
        }
    }

    fn enter(&mut self, state: RunState) {
        tracing::info!(run_id = %self.run_id, state = ?state, "pipeline transition");
        self.states.push(state);
    }

    fn fail<T>(mut self, error: PipelineError) -> PipelineRun<T> {
        tracing::warn!(run_id = %self.run_id, error = %error, "pipeline run failed");
        self.states.push(RunState::Failed);
        PipelineRun {
            run_id: self.run_id,
            outcome: Err(error),
            states: self.states,
        }
    }

    fn succeed<T>(mut self, value: T) -> PipelineRun<T> {
        self.states.push(RunState::Succeeded);
        PipelineRun {
            run_id: self.run_id,
            outcome: Ok(value),
            states: self.states,
        }
    }
}

/// Orchestrates one generation request end to end.
pub struct Pipeline {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            generator,
            store,
            blobs,
        }
    }

    pub async fn run_advisory(&self, input: AdvisoryInput) -> PipelineRun<AdvisoryRecord> {
        let mut trace = Trace::start();

        trace.enter(RunState::Requesting);
        let prompt =
            prompt::advisory_prompt(&input.crop, &input.location, &input.season, input.language);
        let raw = match self.generator.generate(&prompt, None).await {
            Ok(text) => text,
            Err(e) => return trace.fail(e.into()),
        };

        trace.enter(RunState::Extracting);
        let outcome = match extract::extract_advisory(&raw) {
            Ok(o) => o,
            Err(e) => return trace.fail(e.into()),
        };

        trace.enter(RunState::Persisting);
        // the advice tree is serialized to text at rest
        let new = NewAdvisory {
            user_id: input.owner,
            diagnosis: outcome.diagnosis,
            advice: outcome.advice.to_string(),
        };
        match self.store.insert_advisory(new).await {
            Ok(record) => trace.succeed(record),
            Err(e) => trace.fail(e.into()),
        }
    }

    pub async fn run_diagnosis(&self, input: DiagnosisInput) -> PipelineRun<DiagnosticRecord> {
        let mut trace = Trace::start();

        trace.enter(RunState::Requesting);
        let prompt = prompt::diagnosis_prompt(input.language);
        let image = InlineImage::from_bytes(input.content_type.clone(), &input.image);
        let raw = match self.generator.generate(&prompt, Some(&image)).await {
            Ok(text) => text,
            Err(e) => return trace.fail(e.into()),
        };

        trace.enter(RunState::Extracting);
        let outcome = match extract::extract_diagnosis(&raw) {
            Ok(o) => o,
            Err(e) => return trace.fail(e.into()),
        };

        trace.enter(RunState::Persisting);
        // blob strictly before row: the row must never reference a blob that
        // does not exist
        let key = storage::object_key(input.owner, Utc::now(), &input.file_ext);
        let image_url = match self
            .blobs
            .upload(&key, input.image, &input.content_type)
            .await
        {
            Ok(url) => url,
            Err(e) => return trace.fail(e.into()),
        };

        let new = NewDiagnostic {
            user_id: input.owner,
            image_url,
            diagnosis: outcome.diagnosis,
            advice: outcome.advice,
            confidence: outcome.confidence,
        };
        match self.store.insert_diagnostic(new).await {
            Ok(record) => trace.succeed(record),
            Err(e) => {
                // accepted leak: the uploaded blob stays behind
                tracing::warn!(run_id = %trace.run_id, leaked_key = %key, "row insert failed after blob upload");
                trace.fail(e.into())
            }
        }
    }
}

// ============================================================================
// TESTS — in-memory fakes, no network or database
// ============================================================================
