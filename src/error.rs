//! Error types for the generation client and the pipeline.
//!
//! `GenerationError` stays at the external-call boundary; `PipelineError`
//! adds the stage, tier and question number the failure belongs to.

use std::time::Duration;

use thiserror::Error;

use crate::domain::Difficulty;
use crate::stages::Stage;

/// Failure of a single call to the text-generation service.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation service error: {0}")]
    Service(String),

    #[error("generation service HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("generation call timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation service returned an empty reply")]
    EmptyReply,

    #[error("reply is not valid JSON for {schema}: {source}")]
    Malformed {
        schema: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("reply does not match the {schema} schema: {detail}")]
    SchemaMismatch { schema: &'static str, detail: String },
}

/// Where the question count is verified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Checkpoint {
    AfterScheduling,
    AfterAssembly,
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Checkpoint::AfterScheduling => f.write_str("after difficulty scheduling"),
            Checkpoint::AfterAssembly => f.write_str("after assembly"),
        }
    }
}

/// A failed pipeline run. Exactly one of these is surfaced per run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} generation failed for difficulty {difficulty}: {source}")]
    Generation {
        stage: Stage,
        difficulty: Difficulty,
        #[source]
        source: GenerationError,
    },

    #[error("expected {expected} questions {checkpoint} but got {actual}")]
    CountMismatch {
        checkpoint: Checkpoint,
        expected: usize,
        actual: usize,
    },

    #[error("{stage} failed for question {question_number} (difficulty {difficulty}): {source}")]
    StageFailure {
        stage: Stage,
        question_number: u32,
        difficulty: Difficulty,
        #[source]
        source: GenerationError,
    },

    #[error("{stage} worker aborted: {detail}")]
    WorkerAborted { stage: Stage, detail: String },

    #[error("internal pipeline error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stage the failure belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Generation { stage, .. }
            | Self::StageFailure { stage, .. }
            | Self::WorkerAborted { stage, .. } => Some(*stage),
            Self::CountMismatch { .. } | Self::Internal(_) => None,
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
