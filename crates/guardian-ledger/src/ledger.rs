//! The strike ledger.
//!
//! All mutating operations funnel through a single async write lock before
//! touching storage. This is a correctness requirement, not an optimization:
//! sender and receiver responses for the same interaction can arrive from two
//! concurrent callers, and unserialized read-modify-write cycles against the
//! pending store would lose one of them.

use crate::error::{LedgerError, Result};
use crate::models::{
    AccountAttributes, InteractionResult, PendingInteraction, ReceiverResponse, SenderResponse,
    StrikeEvent, StrikeRecord, UserStrikeProfile, MAX_STRIKES,
};
use crate::storage::Storage;
use crate::sync::AccountSync;
use chrono::Utc;
use guardian_detector::DetectionResult;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Context attached to a strike application, recorded in the audit trail.
#[derive(Debug, Clone, Default)]
pub struct StrikeContext {
    /// Rule category of the original detection.
    pub category: String,
    /// Severity rank of the original detection.
    pub severity: u8,
    /// The message that triggered the interaction.
    pub message: String,
    /// Sender's response, if any.
    pub sender_response: Option<SenderResponse>,
    /// Receiver's response, if any.
    pub receiver_response: Option<ReceiverResponse>,
}

impl StrikeContext {
    fn from_interaction(interaction: &PendingInteraction) -> Self {
        Self {
            category: "interaction".to_string(),
            severity: 2,
            message: interaction.message.clone(),
            sender_response: interaction.sender_response,
            receiver_response: interaction.receiver_response,
        }
    }
}

/// Final strike accounting for one resolved interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// Fractional strikes this interaction added.
    pub strikes_added: f64,
    /// New authoritative total for the sender.
    pub new_total: f64,
    /// Whether the total reached [`MAX_STRIKES`].
    pub limit_reached: bool,
}

/// Outcome of recording a receiver response.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiverOutcome {
    /// The receiver's judgment arrived before the sender's decision. It has
    /// been stored; resolution completes once the sender responds.
    AwaitingSender,

    /// The interaction resolved against the acting user's own ledger entry
    /// (the acting identity is the sender).
    Resolved(Resolution),

    /// The interaction resolved on a different device than the sender's.
    /// The authoritative ledger update happens asynchronously when the
    /// sender's device applies the carried event; the fields here are the
    /// computed values for immediate UI feedback only.
    Deferred {
        /// Fractional strikes computed for this interaction.
        strikes_added: f64,
        /// Whether the computed strikes alone reach the limit.
        limit_reached: bool,
        /// Cross-party notification to hand to the transport.
        event: StrikeEvent,
    },
}

/// Durable per-user strike accounting, keyed by user id.
///
/// One ledger instance is constructed at process start and shared by
/// reference; other components never touch its storage directly.
pub struct StrikeLedger {
    storage: Storage,
    account_sync: Arc<dyn AccountSync>,
    // Single-writer queue over all mutating operations.
    write_lock: Mutex<()>,
}

impl StrikeLedger {
    /// Create a ledger over an opened storage database.
    pub fn new(storage: Storage, account_sync: Arc<dyn AccountSync>) -> Self {
        Self {
            storage,
            account_sync,
            write_lock: Mutex::new(()),
        }
    }

    /// Open a ledger database at the given path.
    pub fn open<P: AsRef<std::path::Path>>(
        path: P,
        account_sync: Arc<dyn AccountSync>,
    ) -> Result<Self> {
        Ok(Self::new(Storage::open(path)?, account_sync))
    }

    /// In-memory ledger for tests.
    pub fn temporary(account_sync: Arc<dyn AccountSync>) -> Result<Self> {
        Ok(Self::new(Storage::temporary()?, account_sync))
    }

    /// Store a new pending interaction for a flagged message and return its
    /// fresh id. Ids are never reused.
    pub async fn create_pending_interaction(
        &self,
        sender_id: &str,
        receiver_id: &str,
        message: &str,
        detection: &DetectionResult,
    ) -> Result<Uuid> {
        let _guard = self.write_lock.lock().await;
        let interaction = PendingInteraction::new(sender_id, receiver_id, message, detection);
        let id = interaction.id;
        self.storage.store_pending(&interaction)?;
        debug!(%id, sender_id, "created pending interaction");
        Ok(id)
    }

    /// Record the sender's response to a flagged message.
    ///
    /// Fails with [`LedgerError::UnknownInteraction`] if the id does not name
    /// a live pending interaction. Normally strikes are not computed here;
    /// the exception is a receiver judgment that raced ahead of the sender's
    /// decision, in which case this call completes the pair and resolves the
    /// interaction on the sender's own device. A pair that maps to zero
    /// strikes (Retract/Edit) just closes: no record, no resolution.
    pub async fn record_sender_response(
        &self,
        interaction_id: Uuid,
        response: SenderResponse,
    ) -> Result<Option<Resolution>> {
        let _guard = self.write_lock.lock().await;
        let mut interaction = self
            .storage
            .load_pending(interaction_id)?
            .ok_or(LedgerError::UnknownInteraction(interaction_id))?;

        interaction.sender_response = Some(response);

        if let Some(receiver_response) = interaction.receiver_response {
            // The receiver already judged; this call completes the pair.
            // Recording the sender response happens on the sender's device,
            // so the application here is authoritative.
            let result = InteractionResult::new(response, receiver_response);
            if result.strikes == 0.0 {
                // Retract/Edit after a racing judgment: terminal with no
                // penalty, no audit record, no consequence to surface.
                self.storage.delete_pending(interaction_id)?;
                debug!(id = %interaction_id, "interaction closed without strikes");
                return Ok(None);
            }
            let context = StrikeContext::from_interaction(&interaction);
            let (new_total, limit_reached) = self
                .apply_strikes(&interaction.sender_id, result.strikes, context)
                .await?;
            self.storage.delete_pending(interaction_id)?;
            info!(
                id = %interaction_id,
                strikes = result.strikes,
                "late sender response completed interaction"
            );
            return Ok(Some(Resolution {
                strikes_added: result.strikes,
                new_total,
                limit_reached,
            }));
        }

        self.storage.store_pending(&interaction)?;
        debug!(id = %interaction_id, ?response, "recorded sender response");
        Ok(None)
    }

    /// Record the receiver's judgment and, when both responses are present,
    /// resolve the interaction.
    ///
    /// `acting_user` is the identity recording the response. If it matches
    /// the interaction's sender (self-test or same-device scenario) strikes
    /// apply directly to the local ledger; otherwise resolution defers to a
    /// cross-party [`StrikeEvent`] addressed to the sender's device.
    pub async fn record_receiver_response(
        &self,
        interaction_id: Uuid,
        response: ReceiverResponse,
        acting_user: &str,
    ) -> Result<ReceiverOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut interaction = self
            .storage
            .load_pending(interaction_id)?
            .ok_or(LedgerError::UnknownInteraction(interaction_id))?;

        interaction.receiver_response = Some(response);

        let Some(sender_response) = interaction.sender_response else {
            // Receipt raced ahead of the sender's decision. Store the judgment
            // and resolve once the sender responds.
            self.storage.store_pending(&interaction)?;
            debug!(id = %interaction_id, "receiver response stored, awaiting sender");
            return Ok(ReceiverOutcome::AwaitingSender);
        };

        let result = InteractionResult::new(sender_response, response);

        if acting_user == interaction.sender_id {
            let context = StrikeContext::from_interaction(&interaction);
            let (new_total, limit_reached) = self
                .apply_strikes(&interaction.sender_id, result.strikes, context)
                .await?;
            self.storage.delete_pending(interaction_id)?;
            info!(
                id = %interaction_id,
                strikes = result.strikes,
                new_total,
                limit_reached,
                "interaction resolved locally"
            );
            Ok(ReceiverOutcome::Resolved(Resolution {
                strikes_added: result.strikes,
                new_total,
                limit_reached,
            }))
        } else {
            let event = StrikeEvent {
                interaction_id,
                sender_id: interaction.sender_id.clone(),
                receiver_response: response,
                strikes: result.strikes,
                timestamp: Utc::now(),
            };
            self.storage.delete_pending(interaction_id)?;
            info!(
                id = %interaction_id,
                sender_id = %interaction.sender_id,
                strikes = result.strikes,
                "interaction resolved cross-party, event emitted"
            );
            Ok(ReceiverOutcome::Deferred {
                strikes_added: result.strikes,
                limit_reached: result.strikes >= MAX_STRIKES,
                event,
            })
        }
    }

    /// Apply a cross-party strike event on the sender's own device. This is
    /// the authoritative half of a deferred resolution.
    pub async fn apply_strike_event(&self, event: &StrikeEvent) -> Result<(f64, bool)> {
        let _guard = self.write_lock.lock().await;
        let context = StrikeContext {
            category: "interaction".to_string(),
            severity: 2,
            message: String::new(),
            sender_response: Some(SenderResponse::JustJoking),
            receiver_response: Some(event.receiver_response),
        };
        self.apply_strikes(&event.sender_id, event.strikes, context)
            .await
    }

    /// Add strikes to a user's account.
    ///
    /// Returns the new fractional total and whether it reached the limit.
    pub async fn add_strikes(
        &self,
        user_id: &str,
        amount: f64,
        context: StrikeContext,
    ) -> Result<(f64, bool)> {
        let _guard = self.write_lock.lock().await;
        self.apply_strikes(user_id, amount, context).await
    }

    /// Legacy detection-only penalty: strikes weighted by severity, no
    /// receiver judgment involved.
    pub async fn add_strike_for_detection(
        &self,
        user_id: &str,
        detection: &DetectionResult,
    ) -> Result<(u32, bool)> {
        let context = StrikeContext {
            category: detection.rule.category.to_string(),
            severity: detection.severity.rank(),
            message: detection.matched_span.clone(),
            sender_response: None,
            receiver_response: None,
        };
        let (total, limit_reached) = self
            .add_strikes(user_id, detection.severity.strike_weight(), context)
            .await?;
        Ok((total.ceil() as u32, limit_reached))
    }

    /// Set a user's strike count to exactly 0. Used only after a corrective
    /// consequence completes; appends no audit record.
    pub async fn reset_strikes(&self, user_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut profile = self
            .storage
            .load_profile(user_id)?
            .unwrap_or_else(|| UserStrikeProfile::empty(user_id));

        let previous = profile.strikes;
        profile.strikes = 0;
        self.storage.store_profile(&profile)?;
        info!(user_id, previous, "strike count reset");

        self.mirror(&profile).await;
        Ok(())
    }

    /// Current strike count, 0 if the ledger has never seen this user.
    ///
    /// Reported at integer granularity per the persistence policy, as a float
    /// for comparison against [`MAX_STRIKES`].
    pub fn current_strikes(&self, user_id: &str) -> Result<f64> {
        Ok(self
            .storage
            .load_profile(user_id)?
            .map(|p| f64::from(p.strikes))
            .unwrap_or(0.0))
    }

    /// A user's strike history, newest first.
    pub fn strike_history(&self, user_id: &str) -> Result<Vec<StrikeRecord>> {
        let mut records = self.storage.load_history(user_id)?;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    /// All unresolved pending interactions, for diagnostics.
    pub fn pending_interactions(&self) -> Result<Vec<PendingInteraction>> {
        self.storage.list_pending()
    }

    /// Look up a single pending interaction.
    pub fn pending_interaction(&self, id: Uuid) -> Result<Option<PendingInteraction>> {
        self.storage.load_pending(id)
    }

    /// Drop a pending interaction without applying strikes. Used for the
    /// terminal `Retract`/`Edit` branches, where the receiver phase is never
    /// reached. Returns whether the interaction existed.
    pub async fn discard_pending_interaction(&self, id: Uuid) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let existed = self.storage.delete_pending(id)?;
        debug!(%id, existed, "pending interaction discarded");
        Ok(existed)
    }

    /// The underlying storage handle.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    // Caller must hold the write lock.
    async fn apply_strikes(
        &self,
        user_id: &str,
        amount: f64,
        context: StrikeContext,
    ) -> Result<(f64, bool)> {
        let mut profile = self
            .storage
            .load_profile(user_id)?
            .unwrap_or_else(|| UserStrikeProfile::empty(user_id));

        let previous = f64::from(profile.strikes);
        let new_total = previous + amount;
        // Product policy: fractional accumulation, ceiling persistence. A
        // single 0.5 interaction already reads back as 1 strike.
        profile.strikes = new_total.ceil() as u32;

        let record = StrikeRecord {
            timestamp: Utc::now(),
            category: context.category,
            severity: context.severity,
            message: context.message,
            sender_response: context.sender_response,
            receiver_response: context.receiver_response,
            strikes_added: amount,
        };
        self.storage.append_record(user_id, &record)?;
        self.storage.store_profile(&profile)?;

        let limit_reached = new_total >= MAX_STRIKES;
        if limit_reached {
            info!(user_id, new_total, "strike limit reached");
        } else {
            debug!(user_id, amount, new_total, "strikes applied");
        }

        self.mirror(&profile).await;
        Ok((new_total, limit_reached))
    }

    // Mirror failure never blocks or rolls back the local result.
    async fn mirror(&self, profile: &UserStrikeProfile) {
        let attributes = AccountAttributes::from(profile);
        if let Err(e) = self
            .account_sync
            .update_account(&profile.user_id, &attributes)
            .await
        {
            warn!(user_id = %profile.user_id, "account mirror failed, local ledger unaffected: {e}");
        }
    }
}

impl std::fmt::Debug for StrikeLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrikeLedger")
            .field("storage", &self.storage)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::NullAccountSync;
    use guardian_detector::{DetectionRule, Detector, RuleCatalog, RuleCategory};

    fn detection(category: RuleCategory) -> DetectionResult {
        let detector = Detector::new(RuleCatalog::from_rules(vec![DetectionRule {
            keyword: "flagged".to_string(),
            category,
        }]));
        detector.analyze("this is flagged text").unwrap()
    }

    fn ledger() -> StrikeLedger {
        StrikeLedger::temporary(Arc::new(NullAccountSync)).unwrap()
    }

    #[tokio::test]
    async fn unknown_interaction_fails_closed() {
        let ledger = ledger();
        let id = Uuid::new_v4();

        let err = ledger
            .record_sender_response(id, SenderResponse::JustJoking)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownInteraction(_)));

        let err = ledger
            .record_receiver_response(id, ReceiverResponse::Exit, "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownInteraction(_)));
    }

    #[tokio::test]
    async fn receiver_before_sender_awaits() {
        let ledger = ledger();
        let id = ledger
            .create_pending_interaction("alice", "bob", "flagged", &detection(RuleCategory::Offensive))
            .await
            .unwrap();

        let outcome = ledger
            .record_receiver_response(id, ReceiverResponse::Uncomfortable, "bob")
            .await
            .unwrap();
        assert_eq!(outcome, ReceiverOutcome::AwaitingSender);

        // The judgment is retained; the sender's late response completes the
        // pair and resolves on the sender's device.
        let resolution = ledger
            .record_sender_response(id, SenderResponse::JustJoking)
            .await
            .unwrap()
            .expect("late sender response should resolve");
        assert_eq!(resolution.strikes_added, 1.0);
        assert_eq!(ledger.current_strikes("alice").unwrap(), 1.0);
        assert!(ledger.pending_interactions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn retract_after_racing_judgment_leaves_no_trace() {
        let ledger = ledger();
        // Alice is already at the limit; a retraction must not re-trigger it.
        ledger.add_strikes("alice", 3.0, Default::default()).await.unwrap();
        let id = ledger
            .create_pending_interaction("alice", "bob", "flagged", &detection(RuleCategory::Offensive))
            .await
            .unwrap();
        ledger
            .record_receiver_response(id, ReceiverResponse::Uncomfortable, "bob")
            .await
            .unwrap();

        let resolution = ledger
            .record_sender_response(id, SenderResponse::Retract)
            .await
            .unwrap();
        assert!(resolution.is_none());
        assert_eq!(ledger.current_strikes("alice").unwrap(), 3.0);
        assert_eq!(ledger.strike_history("alice").unwrap().len(), 1);
        assert!(ledger.pending_interactions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_device_resolution_applies_locally() {
        let ledger = ledger();
        let id = ledger
            .create_pending_interaction("alice", "bob", "flagged", &detection(RuleCategory::Offensive))
            .await
            .unwrap();
        ledger
            .record_sender_response(id, SenderResponse::JustJoking)
            .await
            .unwrap();

        let outcome = ledger
            .record_receiver_response(id, ReceiverResponse::Uncomfortable, "alice")
            .await
            .unwrap();
        match outcome {
            ReceiverOutcome::Resolved(resolution) => {
                assert_eq!(resolution.strikes_added, 1.0);
                assert_eq!(resolution.new_total, 1.0);
                assert!(!resolution.limit_reached);
            }
            other => panic!("expected Resolved, got {other:?}"),
        }

        // ceil(1.0) == 1 strike on record, interaction gone.
        assert_eq!(ledger.current_strikes("alice").unwrap(), 1.0);
        assert!(ledger.pending_interactions().unwrap().is_empty());

        // Second resolution attempt with the same id fails.
        let err = ledger
            .record_receiver_response(id, ReceiverResponse::Exit, "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownInteraction(_)));
    }

    #[tokio::test]
    async fn cross_party_resolution_defers_with_event() {
        let ledger = ledger();
        let id = ledger
            .create_pending_interaction("alice", "bob", "flagged", &detection(RuleCategory::Offensive))
            .await
            .unwrap();
        ledger
            .record_sender_response(id, SenderResponse::JustJoking)
            .await
            .unwrap();

        // Bob resolves on his device; Alice's ledger must not change here.
        let outcome = ledger
            .record_receiver_response(id, ReceiverResponse::Exit, "bob")
            .await
            .unwrap();
        let event = match outcome {
            ReceiverOutcome::Deferred {
                strikes_added,
                limit_reached,
                event,
            } => {
                assert_eq!(strikes_added, 2.0);
                assert!(!limit_reached);
                event
            }
            other => panic!("expected Deferred, got {other:?}"),
        };
        assert_eq!(ledger.current_strikes("alice").unwrap(), 0.0);
        assert_eq!(event.sender_id, "alice");
        assert_eq!(event.strikes, 2.0);

        // Applying the event on the sender's device is authoritative.
        let (total, limit_reached) = ledger.apply_strike_event(&event).await.unwrap();
        assert_eq!(total, 2.0);
        assert!(!limit_reached);
        assert_eq!(ledger.current_strikes("alice").unwrap(), 2.0);
    }

    #[tokio::test]
    async fn half_strike_ceils_to_one() {
        let ledger = ledger();
        let id = ledger
            .create_pending_interaction("alice", "bob", "flagged", &detection(RuleCategory::Other))
            .await
            .unwrap();
        ledger
            .record_sender_response(id, SenderResponse::JustJoking)
            .await
            .unwrap();
        let outcome = ledger
            .record_receiver_response(id, ReceiverResponse::Acceptable, "alice")
            .await
            .unwrap();

        match outcome {
            ReceiverOutcome::Resolved(resolution) => assert_eq!(resolution.new_total, 0.5),
            other => panic!("expected Resolved, got {other:?}"),
        }
        // Persisted at ceiling granularity.
        assert_eq!(ledger.current_strikes("alice").unwrap(), 1.0);
    }

    #[tokio::test]
    async fn limit_reached_at_threshold() {
        let ledger = ledger();
        let (_, limit) = ledger
            .add_strikes("alice", 2.0, StrikeContext::default())
            .await
            .unwrap();
        assert!(!limit);

        let (total, limit) = ledger
            .add_strikes("alice", 2.0, StrikeContext::default())
            .await
            .unwrap();
        assert_eq!(total, 4.0);
        assert!(limit);
        assert_eq!(ledger.current_strikes("alice").unwrap(), 4.0);
    }

    #[tokio::test]
    async fn reset_always_yields_zero() {
        let ledger = ledger();
        ledger
            .add_strikes("alice", 2.5, StrikeContext::default())
            .await
            .unwrap();
        ledger.reset_strikes("alice").await.unwrap();
        assert_eq!(ledger.current_strikes("alice").unwrap(), 0.0);

        // Idempotent, including for users never seen before.
        ledger.reset_strikes("alice").await.unwrap();
        ledger.reset_strikes("nobody").await.unwrap();
        assert_eq!(ledger.current_strikes("nobody").unwrap(), 0.0);
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let ledger = ledger();
        let mut first = StrikeContext::default();
        first.message = "first".to_string();
        let mut second = StrikeContext::default();
        second.message = "second".to_string();

        ledger.add_strikes("alice", 0.5, first).await.unwrap();
        ledger.add_strikes("alice", 1.0, second).await.unwrap();

        let history = ledger.strike_history("alice").unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].timestamp >= history[1].timestamp);
        assert_eq!(history[0].strikes_added, 1.0);
    }

    #[tokio::test]
    async fn detection_only_penalty_uses_severity_weight() {
        let ledger = ledger();
        let (total, limit) = ledger
            .add_strike_for_detection("alice", &detection(RuleCategory::Offensive))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert!(limit);
    }

    #[tokio::test]
    async fn mirror_failure_leaves_local_totals_intact() {
        struct FailingSync;

        #[async_trait::async_trait]
        impl AccountSync for FailingSync {
            async fn update_account(
                &self,
                _user_id: &str,
                _attributes: &AccountAttributes,
            ) -> std::result::Result<(), String> {
                Err("account store unreachable".to_string())
            }
        }

        let ledger = StrikeLedger::temporary(Arc::new(FailingSync)).unwrap();
        let (total, limit) = ledger
            .add_strikes("alice", 2.0, StrikeContext::default())
            .await
            .unwrap();
        assert_eq!(total, 2.0);
        assert!(!limit);
        assert_eq!(ledger.current_strikes("alice").unwrap(), 2.0);
    }
}
