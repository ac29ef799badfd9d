//! # Guardian Router
//!
//! Classifies every inbound chat event by moderation-relevant type and the
//! observer's role, and maps the pair to an action. Classification is pure
//! and total: every `(kind, role)` combination is mapped, and everything that
//! is not the one actionable case falls through to `Ignore`. Nothing in this
//! crate ever raises past its boundary.
//!
//! ## Routing Table
//!
//! | Kind | Role | Action |
//! |------|------|--------|
//! | Flagged | Receiver | ShowReceiverPrompt |
//! | Flagged | Sender | Ignore (handled before sending) |
//! | Flagged | SelfResponse | Ignore (malformed echo) |
//! | ReceiverResponseEcho | any | Ignore (legacy path, responses record silently) |
//! | Regular | any | Ignore |
//!
//! A flagged message whose payload lacks a well-formed interaction id is a
//! data-integrity fault: logged and ignored, never a crash.

mod envelope;
mod router;

pub use envelope::{MessageEnvelope, MessageKind, FLAGGED_MESSAGE_TAG, RECEIVER_RESPONSE_TAG};
pub use router::{classify, MessageRole, RouteAction};
