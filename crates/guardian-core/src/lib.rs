//! # Guardian Core
//!
//! Bidirectional content moderation for a peer-to-peer chat client.
//! Orchestrates the detector, strike ledger, message router, and notification
//! dispatcher behind a single [`Guardian`] engine.
//!
//! ## Pipeline
//!
//! ```text
//! outgoing text ──► Detector ──► (flagged?) ──► PendingInteraction in Ledger
//!                                                      │
//!                                        sender prompt via Dispatcher
//!                                                      │
//!                         Retract / Edit ── terminal, zero strikes
//!                                                      │
//!                         JustJoking ── message sent, tagged with interaction id
//!                                                      │
//!                         Router classifies on the peer ── receiver prompt
//!                                                      │
//!                         receiver judgment ── Ledger computes + applies strikes
//!                                                      │
//!                         outcome notices to both sides (exit / limit reached)
//! ```
//!
//! ## Failure Posture
//!
//! Detection and routing degrade, never fail: a missing rule catalog means
//! "never flags", a malformed payload means "ignore". Ledger faults surface
//! as explicit `Result` errors so the presentation layer can re-prompt.
//!
//! ## Example
//!
//! ```rust,ignore
//! use guardian_core::{Guardian, GuardianConfig, OutgoingReview};
//!
//! let guardian = Guardian::from_config("alice", &GuardianConfig::default(), transport, sync)?;
//!
//! match guardian.review_outgoing("bob", "you're such an idiot").await? {
//!     OutgoingReview::Clean => { /* hand to transport as-is */ }
//!     OutgoingReview::Flagged { interaction_id, .. } => {
//!         // sender prompt was raised; wait for resolve_sender_response
//!     }
//! }
//! ```

mod config;
mod dispatch;
mod error;
mod guardian;
mod transport;

pub use config::{DetectorConfig, GuardianConfig, LedgerConfig};
pub use dispatch::{
    Dispatcher, ModerationObserver, OutcomeNotice, ReceiverPrompt, SenderPrompt,
};
pub use error::GuardianError;
pub use guardian::{Guardian, InteractionOutcome, OutgoingReview, SenderDecision};
pub use transport::Transport;

// Re-export component types for consumers that only depend on the facade.
pub use guardian_detector::{DetectionResult, Detector, RuleCatalog, RuleCategory, Severity};
pub use guardian_ledger::{
    ReceiverOutcome, ReceiverResponse, SenderResponse, StrikeEvent, StrikeLedger, StrikeRecord,
    MAX_STRIKES,
};
pub use guardian_router::{classify, MessageEnvelope, MessageKind, MessageRole, RouteAction};

/// Core result type for guardian operations.
pub type Result<T> = std::result::Result<T, GuardianError>;
