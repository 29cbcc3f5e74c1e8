//! Error types for the media sync engine

use thiserror::Error;

use crate::sync::SyncFailure;
use crate::types::EventId;

/// Main error type for sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// The device has no network connection
    #[error("No connectivity: {0}")]
    NoConnectivity(String),

    /// The server was reached but the request failed
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),

    /// A media file could not be downloaded
    #[error("Download failed: {0}")]
    Download(String),

    /// An event id was rejected as a duplicate by the ledger even though
    /// the existence check said it was new
    #[error("Ledger conflict: event {event_id} already recorded")]
    LedgerConflict {
        /// The conflicting event id
        event_id: EventId,
    },

    /// A record or event was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Error during storage operations (redb)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl SyncError {
    /// Classify this error for the terminal `UpdateError` status.
    pub fn failure_kind(&self) -> SyncFailure {
        match self {
            SyncError::NoConnectivity(_) => SyncFailure::Connectivity,
            SyncError::RemoteFetch(_) | SyncError::Download(_) => SyncFailure::RemoteFetch,
            SyncError::LedgerConflict { .. } => SyncFailure::LedgerConflict,
            _ => SyncFailure::Storage,
        }
    }

    /// Whether the next run can be expected to succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::NoConnectivity(_) | SyncError::RemoteFetch(_) | SyncError::Download(_)
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type alias using SyncError
pub type SyncResult<T> = Result<T, SyncError>;
