//! Wire model for chat messages as the moderation core sees them.

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Tag attached to a message that was flagged and sent anyway.
pub const FLAGGED_MESSAGE_TAG: &str = "flagged_message";

/// Tag of the retired receiver-response echo messages. Still recognized so
/// old clients' traffic routes to `Ignore` instead of `Regular` handling.
pub const RECEIVER_RESPONSE_TAG: &str = "receiver_response";

/// Moderation-relevant type of a message, derived from its attached tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A flagged message carrying an interaction payload.
    Flagged,
    /// Legacy receiver-response echo; always ignored.
    ReceiverResponseEcho,
    /// Ordinary chat traffic.
    Regular,
}

impl MessageKind {
    /// Derive the kind from a message tag. Unknown tags are `Regular`.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some(FLAGGED_MESSAGE_TAG) => Self::Flagged,
            Some(RECEIVER_RESPONSE_TAG) => Self::ReceiverResponseEcho,
            _ => Self::Regular,
        }
    }
}

/// A chat message with the metadata the moderation core cares about.
///
/// The transport owns delivery; this is only the shape that crosses the seam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Transport-assigned message id.
    pub message_id: String,
    /// Identity that originated the message.
    pub sender_id: String,
    /// Message text.
    pub body: String,
    /// Moderation tag (`custom_type` on the wire), if any.
    pub tag: Option<String>,
    /// Structured payload attached to the message, as a JSON string.
    pub data: Option<String>,
}

/// Shape of the structured payload attached to flagged messages.
#[derive(Debug, Serialize, Deserialize)]
struct FlaggedPayload {
    interaction_id: Uuid,
}

impl MessageEnvelope {
    /// Envelope for an ordinary outgoing message.
    pub fn regular(
        message_id: impl Into<String>,
        sender_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            sender_id: sender_id.into(),
            body: body.into(),
            tag: None,
            data: None,
        }
    }

    /// Envelope for a flagged message being sent anyway, tagged and carrying
    /// the interaction id so the receiver's device can correlate its prompt.
    pub fn flagged(
        message_id: impl Into<String>,
        sender_id: impl Into<String>,
        body: impl Into<String>,
        interaction_id: Uuid,
    ) -> Self {
        let payload = FlaggedPayload { interaction_id };
        Self {
            message_id: message_id.into(),
            sender_id: sender_id.into(),
            body: body.into(),
            tag: Some(FLAGGED_MESSAGE_TAG.to_string()),
            // Serializing a two-field struct to JSON cannot fail.
            data: serde_json::to_string(&payload).ok(),
        }
    }

    /// Moderation kind derived from the tag.
    pub fn kind(&self) -> MessageKind {
        MessageKind::from_tag(self.tag.as_deref())
    }

    /// Extract the interaction id from the attached payload.
    ///
    /// Returns `None` for absent or malformed payloads; on a flagged message
    /// that is a data-integrity fault, logged here.
    pub fn interaction_id(&self) -> Option<Uuid> {
        let data = self.data.as_deref()?;
        match serde_json::from_str::<FlaggedPayload>(data) {
            Ok(payload) => Some(payload.interaction_id),
            Err(e) => {
                if self.kind() == MessageKind::Flagged {
                    warn!(
                        message_id = %self.message_id,
                        "flagged message carries malformed interaction payload: {e}"
                    );
                }
                None
            }
        }
    }
}
