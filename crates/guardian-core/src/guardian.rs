//! The guardian engine: the two-phase sender/receiver interaction flow.
//!
//! One engine instance exists per process, constructed at startup with the
//! local identity and shared by reference. It drives the state machine for a
//! flagged message:
//!
//! ```text
//! Created ──► SenderResponded ──┬──► Retracted        (terminal, 0 strikes)
//!                               ├──► AwaitingEdit     (terminal, 0 strikes)
//!                               └──► AwaitingReceiver ──► ReceiverResponded ──► Resolved(strikes)
//! ```
//!
//! Only `JustJoking` ever reaches the receiver phase; the flagged message is
//! withheld from the transport until that decision is made.

use crate::config::GuardianConfig;
use crate::dispatch::{Dispatcher, OutcomeNotice, ReceiverPrompt, SenderPrompt};
use crate::error::GuardianError;
use crate::transport::Transport;
use crate::Result;

use guardian_detector::{DetectionResult, Detector, RuleCatalog};
use guardian_ledger::{
    AccountSync, LedgerError, ReceiverOutcome, ReceiverResponse, Resolution, SenderResponse,
    StrikeEvent, StrikeLedger, StrikeRecord,
};
use guardian_router::{classify, MessageEnvelope, RouteAction};

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Verdict on a draft outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingReview {
    /// Nothing matched; send as-is.
    Clean,
    /// The message is withheld pending the sender's decision. The sender
    /// prompt has already been raised through the dispatcher.
    Flagged {
        /// Id of the pending interaction created for this message.
        interaction_id: Uuid,
        /// What the detector matched.
        detection: DetectionResult,
    },
}

/// What happened after the sender's decision was recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum SenderDecision {
    /// Message discarded; the composer should be cleared.
    Retracted,
    /// Message handed back for revision; the composer should be restored.
    EditRequested {
        /// The original withheld text.
        original: String,
    },
    /// Message sent through the transport, tagged with the interaction id.
    Sent {
        /// The envelope as handed to the transport.
        envelope: MessageEnvelope,
    },
}

/// Result of recording a receiver judgment.
///
/// For a cross-party resolution `total` is the value computed on this device
/// for immediate feedback; the sender's ledger updates asynchronously when
/// their device applies the strike event. Consumers must not assume the
/// sender's ledger has been updated by the time this is returned.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionOutcome {
    /// Fractional strikes this interaction added (0 while awaiting the
    /// sender's decision).
    pub strikes_added: f64,
    /// Strike total as known to this device.
    pub total: f64,
    /// Whether the limit was reached.
    pub limit_reached: bool,
    /// Consequence notice, if any. Limit takes precedence over exit.
    pub notice: Option<OutcomeNotice>,
}

/// The unified moderation engine.
pub struct Guardian {
    identity: String,
    detector: Detector,
    ledger: Arc<StrikeLedger>,
    dispatcher: Dispatcher,
    transport: Arc<dyn Transport>,
}

impl Guardian {
    /// Create an engine from already-constructed components.
    pub fn new(
        identity: impl Into<String>,
        detector: Detector,
        ledger: Arc<StrikeLedger>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let identity = identity.into();
        info!(identity, rules = detector.catalog().len(), "guardian initialized");
        Self {
            identity,
            detector,
            ledger,
            dispatcher: Dispatcher::new(),
            transport,
        }
    }

    /// Create an engine from configuration: loads the rule catalog (degrading
    /// to no-detection on failure) and opens the ledger database.
    pub fn from_config(
        identity: impl Into<String>,
        config: &GuardianConfig,
        transport: Arc<dyn Transport>,
        account_sync: Arc<dyn AccountSync>,
    ) -> Result<Self> {
        let detector = Detector::new(RuleCatalog::load(&config.detector.catalog_path));
        let ledger = Arc::new(StrikeLedger::open(&config.ledger.db_path, account_sync)?);
        Ok(Self::new(identity, detector, ledger, transport))
    }

    /// The local identity this engine moderates for.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The notification dispatcher, for observer registration.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The underlying ledger, for read-side queries.
    pub fn ledger(&self) -> &StrikeLedger {
        &self.ledger
    }

    // ------------------------------------------------------------------
    // Sender phase
    // ------------------------------------------------------------------

    /// Review a draft outgoing message addressed to `receiver_id`.
    ///
    /// A clean message is the caller's to send. A flagged message is withheld:
    /// a pending interaction is created and the sender prompt raised; the
    /// caller must not send until [`Guardian::resolve_sender_response`]
    /// returns a [`SenderDecision`].
    pub async fn review_outgoing(&self, receiver_id: &str, text: &str) -> Result<OutgoingReview> {
        let Some(detection) = self.detector.analyze(text) else {
            return Ok(OutgoingReview::Clean);
        };

        let interaction_id = self
            .ledger
            .create_pending_interaction(&self.identity, receiver_id, text, &detection)
            .await?;

        self.dispatcher.prompt_sender(&SenderPrompt {
            interaction_id,
            message: text.to_string(),
            matched_span: detection.matched_span.clone(),
            suggestion: detection.suggestion.clone(),
        });

        info!(%interaction_id, severity = ?detection.severity, "outgoing message withheld");
        Ok(OutgoingReview::Flagged {
            interaction_id,
            detection,
        })
    }

    /// Record the sender's decision for a withheld message.
    ///
    /// `Retract` and `Edit` are terminal with zero strikes; `JustJoking`
    /// sends the original text tagged with the interaction id.
    pub async fn resolve_sender_response(
        &self,
        interaction_id: Uuid,
        response: SenderResponse,
    ) -> Result<SenderDecision> {
        let interaction = self
            .ledger
            .pending_interaction(interaction_id)?
            .ok_or(LedgerError::UnknownInteraction(interaction_id))?;

        let late_resolution = self
            .ledger
            .record_sender_response(interaction_id, response)
            .await?;

        let decision = match response {
            SenderResponse::Retract => {
                self.ledger.discard_pending_interaction(interaction_id).await?;
                debug!(%interaction_id, "message retracted");
                SenderDecision::Retracted
            }
            SenderResponse::Edit => {
                self.ledger.discard_pending_interaction(interaction_id).await?;
                debug!(%interaction_id, "message handed back for edit");
                SenderDecision::EditRequested {
                    original: interaction.message.clone(),
                }
            }
            SenderResponse::JustJoking => {
                let envelope = MessageEnvelope::flagged(
                    Uuid::new_v4().to_string(),
                    &self.identity,
                    &interaction.message,
                    interaction_id,
                );
                self.transport
                    .send_message(&envelope)
                    .await
                    .map_err(GuardianError::Transport)?;
                info!(%interaction_id, "flagged message sent anyway");
                SenderDecision::Sent { envelope }
            }
        };

        // A receiver judgment that raced ahead of the sender's decision was
        // completed inside record_sender_response; surface the consequence.
        if let Some(resolution) = late_resolution {
            if resolution.limit_reached {
                self.dispatcher.show_outcome(&OutcomeNotice::LimitReached {
                    total: resolution.new_total,
                });
            }
        }

        Ok(decision)
    }

    // ------------------------------------------------------------------
    // Receiver phase
    // ------------------------------------------------------------------

    /// Record the receiver's judgment of a delivered flagged message.
    ///
    /// When this device is not the sender's, the authoritative strike update
    /// travels as a fire-and-forget event; the returned totals are computed
    /// locally for immediate feedback.
    pub async fn resolve_receiver_response(
        &self,
        interaction_id: Uuid,
        response: ReceiverResponse,
    ) -> Result<InteractionOutcome> {
        let outcome = self
            .ledger
            .record_receiver_response(interaction_id, response, &self.identity)
            .await?;

        let outcome = match outcome {
            ReceiverOutcome::AwaitingSender => InteractionOutcome {
                strikes_added: 0.0,
                total: 0.0,
                limit_reached: false,
                notice: None,
            },
            ReceiverOutcome::Resolved(resolution) => {
                self.outcome_for(resolution, response)
            }
            ReceiverOutcome::Deferred {
                strikes_added,
                limit_reached,
                event,
            } => {
                self.forward_strike_event(event);
                self.outcome_for(
                    Resolution {
                        strikes_added,
                        new_total: strikes_added,
                        limit_reached,
                    },
                    response,
                )
            }
        };

        if let Some(notice) = &outcome.notice {
            self.dispatcher.show_outcome(notice);
        }
        Ok(outcome)
    }

    fn outcome_for(&self, resolution: Resolution, response: ReceiverResponse) -> InteractionOutcome {
        if resolution.strikes_added > 0.0 {
            self.dispatcher
                .show_outcome(&OutcomeNotice::InteractionRecorded {
                    strikes_added: resolution.strikes_added,
                    total: resolution.new_total,
                    receiver_response: response,
                });
        }

        // Limit takes precedence: exit AND limit still goes down the
        // corrective-consequence path.
        let notice = if resolution.limit_reached {
            Some(OutcomeNotice::LimitReached {
                total: resolution.new_total,
            })
        } else if response == ReceiverResponse::Exit {
            Some(OutcomeNotice::ConversationExit)
        } else {
            None
        };

        InteractionOutcome {
            strikes_added: resolution.strikes_added,
            total: resolution.new_total,
            limit_reached: resolution.limit_reached,
            notice,
        }
    }

    // Hand the event to the transport without waiting for the sender's
    // device to apply it. The receiver-side caller gets its result back as
    // soon as the hand-off is queued.
    fn forward_strike_event(&self, event: StrikeEvent) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Err(e) = transport.send_strike_event(&event.sender_id, &event).await {
                warn!(
                    interaction_id = %event.interaction_id,
                    "failed to forward strike event: {e}"
                );
            }
        })
    }

    // ------------------------------------------------------------------
    // Inbound traffic
    // ------------------------------------------------------------------

    /// Route an inbound chat message. Only a flagged message observed by its
    /// receiver raises a prompt; everything else is ignored.
    pub fn handle_incoming(&self, envelope: &MessageEnvelope) -> RouteAction {
        let action = classify(envelope, &self.identity);
        if let RouteAction::ShowReceiverPrompt { interaction_id } = &action {
            self.dispatcher.prompt_receiver(&ReceiverPrompt {
                interaction_id: *interaction_id,
                message: envelope.body.clone(),
            });
        }
        action
    }

    /// Apply an inbound cross-party strike event.
    ///
    /// Only events addressed to the local identity are applied (the sender's
    /// own device is authoritative for its ledger); others are ignored.
    /// Returns the new total and limit status when applied.
    pub async fn handle_strike_event(&self, event: &StrikeEvent) -> Result<Option<(f64, bool)>> {
        if event.sender_id != self.identity {
            debug!(
                interaction_id = %event.interaction_id,
                addressed_to = %event.sender_id,
                "strike event not addressed to this identity, ignoring"
            );
            return Ok(None);
        }

        let (total, limit_reached) = self.ledger.apply_strike_event(event).await?;
        if limit_reached {
            self.dispatcher
                .show_outcome(&OutcomeNotice::LimitReached { total });
        }
        Ok(Some((total, limit_reached)))
    }

    // ------------------------------------------------------------------
    // Presentation queries
    // ------------------------------------------------------------------

    /// Current strike count for a user (integer granularity, as a float).
    pub fn current_strikes(&self, user_id: &str) -> Result<f64> {
        Ok(self.ledger.current_strikes(user_id)?)
    }

    /// Strike history for a user, newest first.
    pub fn strike_history(&self, user_id: &str) -> Result<Vec<StrikeRecord>> {
        Ok(self.ledger.strike_history(user_id)?)
    }

    /// Reset a user's strikes to zero after a corrective consequence
    /// completes.
    pub async fn reset_strikes(&self, user_id: &str) -> Result<()> {
        Ok(self.ledger.reset_strikes(user_id).await?)
    }
}

impl std::fmt::Debug for Guardian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guardian")
            .field("identity", &self.identity)
            .field("rules", &self.detector.catalog().len())
            .finish()
    }
}
