//! # Guardian Ledger
//!
//! Durable strike accounting for the moderation subsystem. The ledger owns
//! the only shared mutable state in the pipeline:
//!
//! | Document | Key | Purpose |
//! |----------|-----|---------|
//! | `UserStrikeProfile` | user id | Current strike count + mirrored profile fields |
//! | `[StrikeRecord]` | user id | Append-only audit trail, one per completed interaction |
//! | `PendingInteraction` | interaction id | Lifecycle record of one flagged message |
//!
//! ## Consistency Model
//!
//! Every mutating operation is serialized behind a single write lock before it
//! touches storage. Concurrently recording the sender and receiver responses
//! for the *same* interaction is a real race otherwise: two read-modify-write
//! cycles against the pending store can lose one writer's update.
//!
//! The local ledger is authoritative for threshold decisions. The account
//! store mirror is opportunistic: a failed mirror is logged and never blocks
//! or rolls back the local result.
//!
//! ## Numeric Policy
//!
//! Strikes accumulate fractionally (0.5 / 1.0 / 2.0 per interaction) but the
//! persisted count is always `ceil(total)` as an integer, so a single 0.5
//! interaction already reads back as 1 strike. This asymmetry is product
//! policy and must be preserved exactly.

mod error;
mod ledger;
mod models;
mod storage;
mod sync;

pub use error::{LedgerError, Result};
pub use ledger::{ReceiverOutcome, Resolution, StrikeContext, StrikeLedger};
pub use models::{
    AccountAttributes, InteractionResult, PendingInteraction, ReceiverResponse, SenderResponse,
    StrikeEvent, StrikeRecord, UserStrikeProfile, MAX_STRIKES,
};
pub use storage::Storage;
pub use sync::{AccountSync, NullAccountSync};
