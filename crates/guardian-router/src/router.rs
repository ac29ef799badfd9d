//! Type x role classification of inbound messages.

use crate::envelope::{MessageEnvelope, MessageKind};
use tracing::{debug, warn};
use uuid::Uuid;

/// The observer's role relative to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    /// The current identity originated this message.
    Sender,
    /// Someone else originated it; the current identity is the audience.
    Receiver,
    /// An echo of the current identity's own prior response; always ignored.
    SelfResponse,
}

impl MessageRole {
    /// Derive the role from the message's sender identity.
    pub fn derive(kind: MessageKind, sender_id: &str, current_identity: &str) -> Self {
        let is_sender = sender_id == current_identity;
        match kind {
            MessageKind::ReceiverResponseEcho if is_sender => Self::SelfResponse,
            _ if is_sender => Self::Sender,
            _ => Self::Receiver,
        }
    }
}

/// What the moderation core should do with an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// Present the three-choice receiver prompt for this interaction.
    ShowReceiverPrompt {
        /// The interaction the prompt correlates to.
        interaction_id: Uuid,
    },
    /// No moderation action.
    Ignore,
}

/// Classify an inbound message for the given observer identity.
///
/// The routing table is total: only `(Flagged, Receiver)` is actionable, and
/// every other combination, including unknown tags and integrity faults,
/// defaults to [`RouteAction::Ignore`]. This function never fails.
pub fn classify(envelope: &MessageEnvelope, current_identity: &str) -> RouteAction {
    let kind = envelope.kind();
    let role = MessageRole::derive(kind, &envelope.sender_id, current_identity);
    debug!(message_id = %envelope.message_id, ?kind, ?role, "routing inbound message");

    match (kind, role) {
        (MessageKind::Flagged, MessageRole::Receiver) => match envelope.interaction_id() {
            Some(interaction_id) => RouteAction::ShowReceiverPrompt { interaction_id },
            None => {
                warn!(
                    message_id = %envelope.message_id,
                    "flagged message without usable interaction id, ignoring"
                );
                RouteAction::Ignore
            }
        },
        // Sender's own flagged message was handled before sending; response
        // echoes are a retired path; regular traffic is not ours.
        _ => RouteAction::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{FLAGGED_MESSAGE_TAG, RECEIVER_RESPONSE_TAG};

    fn flagged_from(sender: &str) -> MessageEnvelope {
        MessageEnvelope::flagged("m1", sender, "flagged text", Uuid::new_v4())
    }

    #[test]
    fn flagged_message_to_receiver_prompts() {
        let envelope = flagged_from("alice");
        match classify(&envelope, "bob") {
            RouteAction::ShowReceiverPrompt { interaction_id } => {
                assert_eq!(Some(interaction_id), envelope.interaction_id());
            }
            RouteAction::Ignore => panic!("receiver should be prompted"),
        }
    }

    #[test]
    fn own_flagged_message_is_ignored() {
        let envelope = flagged_from("alice");
        assert_eq!(classify(&envelope, "alice"), RouteAction::Ignore);
    }

    #[test]
    fn regular_traffic_is_ignored_for_both_roles() {
        let envelope = MessageEnvelope::regular("m1", "alice", "hello");
        assert_eq!(classify(&envelope, "alice"), RouteAction::Ignore);
        assert_eq!(classify(&envelope, "bob"), RouteAction::Ignore);
    }

    #[test]
    fn response_echoes_are_ignored_for_both_roles() {
        let mut envelope = MessageEnvelope::regular("m1", "alice", "");
        envelope.tag = Some(RECEIVER_RESPONSE_TAG.to_string());
        assert_eq!(classify(&envelope, "alice"), RouteAction::Ignore);
        assert_eq!(classify(&envelope, "bob"), RouteAction::Ignore);
    }

    #[test]
    fn role_derivation() {
        assert_eq!(
            MessageRole::derive(MessageKind::Flagged, "alice", "alice"),
            MessageRole::Sender
        );
        assert_eq!(
            MessageRole::derive(MessageKind::Flagged, "alice", "bob"),
            MessageRole::Receiver
        );
        assert_eq!(
            MessageRole::derive(MessageKind::ReceiverResponseEcho, "alice", "alice"),
            MessageRole::SelfResponse
        );
    }

    #[test]
    fn malformed_flagged_payload_is_ignored_not_fatal() {
        let mut envelope = flagged_from("alice");
        envelope.data = Some("{broken".to_string());
        assert_eq!(envelope.tag.as_deref(), Some(FLAGGED_MESSAGE_TAG));
        assert_eq!(classify(&envelope, "bob"), RouteAction::Ignore);
    }
}
