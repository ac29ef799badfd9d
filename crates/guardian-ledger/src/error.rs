//! Error types for ledger operations.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur while reading or mutating ledger state.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Underlying sled database failure.
    #[error("ledger database error: {0}")]
    Database(#[from] sled::Error),

    /// A persisted document could not be (de)serialized.
    #[error("ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No pending interaction exists with this id. The interaction was
    /// already resolved, or the id is stale from a previous session.
    #[error("no pending interaction with id {0}")]
    UnknownInteraction(Uuid),
}
