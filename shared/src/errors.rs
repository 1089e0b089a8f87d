//! Shared error types for the campaign controller and acquisition worker

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    #[error("Deserialization failed for {path}: {message}")]
    DeserializationError { path: PathBuf, message: String },

    #[error("Artifact I/O failed on {path}: {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact not found: {path}")]
    ArtifactMissing { path: PathBuf },
}

pub type SharedResult<T> = Result<T, SharedError>;
