//! Core data model for the strike subsystem.
//!
//! The response enums are closed: displayable labels are a presentation
//! concern and live with the UI, not here. Wire names (`just_joking`,
//! `acceptable`, ...) must stay stable because they round-trip through
//! message payloads between devices.

use chrono::{DateTime, Utc};
use guardian_detector::DetectionResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Strike threshold shared by all users. Reaching it triggers the
/// corrective-consequence path.
pub const MAX_STRIKES: f64 = 3.0;

/// The sender's choice when their outgoing message is flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderResponse {
    /// Discard the message entirely.
    Retract,
    /// Take the message back into the composer for revision.
    Edit,
    /// Send anyway; the receiver will judge the impact.
    JustJoking,
}

/// The receiver's judgment of a flagged message that was sent anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverResponse {
    /// The message was fine.
    Acceptable,
    /// Uncomfortable, but willing to continue the conversation.
    Uncomfortable,
    /// Leave the conversation now.
    Exit,
}

/// Penalty derived from the `(sender, receiver)` response pair.
///
/// Only `JustJoking` branches ever reach the receiver phase; the
/// `Retract`/`Edit` rows exist so the table stays total, and map to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InteractionResult {
    /// Sender's recorded response.
    pub sender_response: SenderResponse,
    /// Receiver's recorded response.
    pub receiver_response: ReceiverResponse,
    /// Fractional strikes this interaction adds to the sender's account.
    pub strikes: f64,
}

impl InteractionResult {
    /// Compute the result for a response pair.
    pub fn new(sender: SenderResponse, receiver: ReceiverResponse) -> Self {
        Self {
            sender_response: sender,
            receiver_response: receiver,
            strikes: Self::strike_table(sender, receiver),
        }
    }

    fn strike_table(sender: SenderResponse, receiver: ReceiverResponse) -> f64 {
        use ReceiverResponse::*;
        use SenderResponse::*;
        match (sender, receiver) {
            (JustJoking, Acceptable) => 0.5,
            (JustJoking, Uncomfortable) => 1.0,
            (JustJoking, Exit) => 2.0,
            // Structurally unreachable in the normal flow; kept total.
            (Retract | Edit, _) => 0.0,
        }
    }
}

/// Durable record of one flagged message awaiting resolution.
///
/// Created when a message is flagged, mutated twice (sender response, then
/// receiver response), and deleted once terminal. The `id` round-trips
/// through the transport as message metadata so the receiver's device can
/// correlate its prompt back to this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInteraction {
    /// Unique id, never reused across interactions.
    pub id: Uuid,
    /// When the interaction was created.
    pub created_at: DateTime<Utc>,
    /// User who composed the flagged message.
    pub sender_id: String,
    /// User the message is addressed to.
    pub receiver_id: String,
    /// The flagged message text.
    pub message: String,
    /// Compact summary of what the detector matched.
    pub detection_summary: String,
    /// Sender's response, once recorded.
    pub sender_response: Option<SenderResponse>,
    /// Receiver's response, once recorded.
    pub receiver_response: Option<ReceiverResponse>,
}

impl PendingInteraction {
    /// Create a fresh pending interaction for a flagged message.
    pub fn new(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        message: impl Into<String>,
        detection: &DetectionResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            message: message.into(),
            detection_summary: detection.summary(),
            sender_response: None,
            receiver_response: None,
        }
    }

    /// True once both responses are recorded.
    pub fn is_complete(&self) -> bool {
        self.sender_response.is_some() && self.receiver_response.is_some()
    }
}

/// Immutable audit entry, one per completed interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeRecord {
    /// When the strikes were applied.
    pub timestamp: DateTime<Utc>,
    /// Rule category of the original detection.
    pub category: String,
    /// Severity rank of the original detection (1..=3).
    pub severity: u8,
    /// The message that triggered the interaction.
    pub message: String,
    /// Sender's response, if the interaction had one.
    pub sender_response: Option<SenderResponse>,
    /// Receiver's response, if the interaction had one.
    pub receiver_response: Option<ReceiverResponse>,
    /// Fractional strikes this record added.
    pub strikes_added: f64,
}

/// Per-user strike state, plus the profile fields mirrored to the account
/// store alongside the count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStrikeProfile {
    /// Account identifier.
    pub user_id: String,
    /// Current strike count, persisted at integer granularity (`ceil` of the
    /// fractional total).
    pub strikes: u32,
    /// Interests shown on the account record.
    #[serde(default)]
    pub interests: Vec<String>,
    /// Personality tag shown on the account record.
    #[serde(default)]
    pub personality: String,
    /// Risk tag maintained by the matching feature.
    #[serde(default)]
    pub risk_tag: String,
}

impl UserStrikeProfile {
    /// Empty profile for a user the ledger has not seen before.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            strikes: 0,
            interests: Vec::new(),
            personality: String::new(),
            risk_tag: String::new(),
        }
    }
}

/// Account attributes mirrored to the external account store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountAttributes {
    /// Integer strike count.
    pub strikes: u32,
    /// Interests.
    pub interests: Vec<String>,
    /// Personality tag.
    pub personality: String,
    /// Risk tag.
    pub risk_tag: String,
}

impl From<&UserStrikeProfile> for AccountAttributes {
    fn from(profile: &UserStrikeProfile) -> Self {
        Self {
            strikes: profile.strikes,
            interests: profile.interests.clone(),
            personality: profile.personality.clone(),
            risk_tag: profile.risk_tag.clone(),
        }
    }
}

/// Cross-party strike notification.
///
/// Emitted on the receiver's device when an interaction resolves against a
/// different identity, and applied authoritatively when the sender's own
/// device receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeEvent {
    /// The interaction this event resolves.
    pub interaction_id: Uuid,
    /// User the strikes are addressed to.
    pub sender_id: String,
    /// The receiver's judgment.
    pub receiver_response: ReceiverResponse,
    /// Fractional strikes computed on the receiver's device.
    pub strikes: f64,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strike_table_is_exhaustive() {
        use ReceiverResponse::*;
        use SenderResponse::*;

        let expect = [
            (JustJoking, Acceptable, 0.5),
            (JustJoking, Uncomfortable, 1.0),
            (JustJoking, Exit, 2.0),
            (Retract, Acceptable, 0.0),
            (Retract, Uncomfortable, 0.0),
            (Retract, Exit, 0.0),
            (Edit, Acceptable, 0.0),
            (Edit, Uncomfortable, 0.0),
            (Edit, Exit, 0.0),
        ];
        for (sender, receiver, strikes) in expect {
            assert_eq!(
                InteractionResult::new(sender, receiver).strikes,
                strikes,
                "{sender:?}/{receiver:?}"
            );
        }
    }

    #[test]
    fn response_wire_names_are_stable() {
        assert_eq!(
            serde_json::to_string(&SenderResponse::JustJoking).unwrap(),
            "\"just_joking\""
        );
        assert_eq!(
            serde_json::to_string(&ReceiverResponse::Uncomfortable).unwrap(),
            "\"uncomfortable\""
        );
    }

    #[test]
    fn pending_interaction_ids_are_unique() {
        let detection = test_detection();
        let a = PendingInteraction::new("alice", "bob", "hi", &detection);
        let b = PendingInteraction::new("alice", "bob", "hi", &detection);
        assert_ne!(a.id, b.id);
        assert!(!a.is_complete());
    }

    #[test]
    fn profile_round_trips_with_defaults() {
        let json = r#"{"user_id": "alice", "strikes": 2}"#;
        let profile: UserStrikeProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.strikes, 2);
        assert!(profile.interests.is_empty());
    }

    fn test_detection() -> DetectionResult {
        use guardian_detector::{Detector, DetectionRule, RuleCatalog, RuleCategory};
        let detector = Detector::new(RuleCatalog::from_rules(vec![DetectionRule {
            keyword: "hi".to_string(),
            category: RuleCategory::Other,
        }]));
        detector.analyze("hi").unwrap()
    }
}
