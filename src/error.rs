use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::contract::DeliveryError;

/// A single file that could not be moved or deleted, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub filename: String,
    pub reason: String,
}

impl FileFailure {
    pub fn new(filename: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            filename: filename.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.filename, self.reason)
    }
}

/// Errors surfaced by the batch engine at the coordinator boundary.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A storage location or the delivery channel is missing. The cycle aborts without retry.
    #[error("not found: {0}")]
    NotFound(String),

    /// Every tier of the degrade cascade was rejected as too large.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Delivery (or ledger access) failed in a way the next scheduled tick may not repeat.
    #[error("transient delivery error: {0}")]
    TransientDelivery(String),

    /// The batch was delivered but some files could not be archived. Never rolled back.
    #[error("partial commit for {correlation_id}: {} archived, {} failed", .archived.len(), .failed.len())]
    PartialCommit {
        correlation_id: String,
        archived: Vec<String>,
        failed: Vec<FileFailure>,
    },

    /// Undo refused to run because archived files of the batch are gone.
    #[error("cannot undo {correlation_id}: missing from archive: {}", .missing.join(", "))]
    MissingArchiveFile {
        correlation_id: String,
        missing: Vec<String>,
    },

    /// Undo refused to run because files of the same name are back in the pending folder.
    #[error("cannot undo {correlation_id}: already pending: {}", .conflicting.join(", "))]
    RestoreConflict {
        correlation_id: String,
        conflicting: Vec<String>,
    },

    /// Another cycle or undo currently holds the engine.
    #[error("an upload cycle is already in progress")]
    CycleInProgress,

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("storage error at {path:?}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BatchError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BatchError::Storage {
            path: path.into(),
            source,
        }
    }
}

impl From<DeliveryError> for BatchError {
    fn from(e: DeliveryError) -> Self {
        match e {
            DeliveryError::PayloadTooLarge(msg) => BatchError::PayloadTooLarge(msg),
            DeliveryError::NotFound(msg) => BatchError::NotFound(msg),
            DeliveryError::Other(msg) => BatchError::TransientDelivery(msg),
        }
    }
}

/// Failure loading or saving one of the JSON ledgers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed ledger {path:?}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// A ledger that cannot be read or written aborts the current cycle only.
impl From<StoreError> for BatchError {
    fn from(e: StoreError) -> Self {
        BatchError::TransientDelivery(e.to_string())
    }
}

pub type BatchResult<T> = Result<T, BatchError>;
