//! Error types for the guardian engine.

use thiserror::Error;

/// Errors surfaced by the guardian engine.
///
/// Detector and router faults never appear here: both degrade to "no match"
/// or "ignore". What remains is ledger state and transport plumbing.
#[derive(Debug, Error)]
pub enum GuardianError {
    /// Ledger error passthrough (unknown interaction, storage failure).
    #[error("ledger error: {0}")]
    Ledger(#[from] guardian_ledger::LedgerError),

    /// The transport refused or failed to accept a message.
    #[error("transport error: {0}")]
    Transport(String),
}
