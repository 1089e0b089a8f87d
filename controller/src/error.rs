//! Controller-specific error types

use shared::SharedError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Scheduler backend '{backend}' is not available")]
    BackendUnavailable { backend: String },

    #[error("Unknown scheduler: {name}")]
    UnknownScheduler { name: String },

    #[error("Unknown optimizer: {name}")]
    UnknownOptimizer { name: String },

    #[error("Scheduler state mismatch: persisted '{found}' != running '{expected}'")]
    StateMismatch { expected: String, found: String },

    #[error("Optimizer mismatch: artifact from '{found}', session runs '{expected}'")]
    OptimizerMismatch { expected: String, found: String },

    #[error("Acquisition job already in flight: {job_id}")]
    AcquisitionInFlight { job_id: String },

    #[error("Job is not tracked: {job_id}")]
    UnknownJob { job_id: String },

    #[error("Required artifact not found: {path}")]
    MissingArtifact { path: PathBuf },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Case '{case}' error: {reason}")]
    CaseError { case: String, reason: String },

    #[error("Process error: {message}")]
    ProcessError { message: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ControllerError {
    pub fn config(field: impl Into<String>) -> Self {
        Self::ConfigurationError { field: field.into() }
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::ProcessError {
            message: message.into(),
        }
    }

    pub fn case(case: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CaseError {
            case: case.into(),
            reason: reason.into(),
        }
    }

    /// Map a shared artifact error, surfacing a missing file as its own variant
    pub fn artifact(error: SharedError) -> Self {
        match error {
            SharedError::ArtifactMissing { path } => Self::MissingArtifact { path },
            other => Self::SharedError(other),
        }
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;
