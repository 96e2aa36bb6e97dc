use crate::extract::IngestError;
use thiserror::Error;

/// Errors surfaced by the tracking workflow.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("unknown upload batch: {0}")]
    UnknownBatch(String),

    #[error("batch id must not be empty")]
    EmptyBatchId,

    /// The uploaded sheet could not be read at all
    #[error("unreadable roster: {0:#}")]
    Sheet(anyhow::Error),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        TrackerError::Storage(err.into())
    }
}

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::Storage(err.into())
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
