//! Seam to the chat transport.
//!
//! The core consumes two primitives here: "send a message with an attached
//! structured payload" and "send a cross-party strike event". Connection,
//! auth, delivery guarantees, and channel membership are the transport's
//! problem, not ours.

use async_trait::async_trait;
use guardian_ledger::StrikeEvent;
use guardian_router::MessageEnvelope;

/// Chat backend the guardian engine sends through.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a chat message (possibly tagged with moderation metadata).
    async fn send_message(&self, envelope: &MessageEnvelope) -> Result<(), String>;

    /// Deliver a cross-party strike event to the named user's devices.
    async fn send_strike_event(&self, recipient: &str, event: &StrikeEvent)
        -> Result<(), String>;
}
