//! Sled-backed persistence for ledger documents.
//!
//! The database uses three trees (namespaces):
//!
//! | Tree | Key | Value |
//! |------|-----|-------|
//! | `profiles` | user id | serialized [`UserStrikeProfile`] |
//! | `history` | user id | serialized `Vec<StrikeRecord>` |
//! | `pending` | interaction id | serialized [`PendingInteraction`] |
//!
//! Sled itself is thread-safe; write ordering across documents is enforced
//! one level up, by the ledger's write lock, not here.

use crate::error::Result;
use crate::models::{PendingInteraction, StrikeRecord, UserStrikeProfile};
use std::path::Path;
use uuid::Uuid;

/// Tree name for per-user strike profiles.
const PROFILE_TREE: &str = "profiles";

/// Tree name for per-user strike history.
const HISTORY_TREE: &str = "history";

/// Tree name for the process-wide pending-interaction collection.
const PENDING_TREE: &str = "pending";

/// Wrapper around a sled database holding all ledger documents.
#[derive(Clone)]
pub struct Storage {
    db: sled::Db,
    profiles: sled::Tree,
    history: sled::Tree,
    pending: sled::Tree,
}

impl Storage {
    /// Opens or creates a ledger database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// Creates a temporary in-memory database for tests. Data is lost when
    /// the instance is dropped.
    pub fn temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let profiles = db.open_tree(PROFILE_TREE)?;
        let history = db.open_tree(HISTORY_TREE)?;
        let pending = db.open_tree(PENDING_TREE)?;
        Ok(Self {
            db,
            profiles,
            history,
            pending,
        })
    }

    /// Loads a user's strike profile, `None` if the ledger has never seen
    /// this user.
    pub fn load_profile(&self, user_id: &str) -> Result<Option<UserStrikeProfile>> {
        match self.profiles.get(user_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stores (or overwrites) a user's strike profile.
    pub fn store_profile(&self, profile: &UserStrikeProfile) -> Result<()> {
        let bytes = serde_json::to_vec(profile)?;
        self.profiles.insert(profile.user_id.as_bytes(), bytes)?;
        Ok(())
    }

    /// Loads a user's full strike history in stored (append) order.
    pub fn load_history(&self, user_id: &str) -> Result<Vec<StrikeRecord>> {
        match self.history.get(user_id.as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Appends one record to a user's strike history.
    pub fn append_record(&self, user_id: &str, record: &StrikeRecord) -> Result<()> {
        let mut records = self.load_history(user_id)?;
        records.push(record.clone());
        let bytes = serde_json::to_vec(&records)?;
        self.history.insert(user_id.as_bytes(), bytes)?;
        Ok(())
    }

    /// Loads a pending interaction by id.
    pub fn load_pending(&self, id: Uuid) -> Result<Option<PendingInteraction>> {
        match self.pending.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stores (or overwrites) a pending interaction, keyed by its id.
    pub fn store_pending(&self, interaction: &PendingInteraction) -> Result<()> {
        let bytes = serde_json::to_vec(interaction)?;
        self.pending.insert(interaction.id.as_bytes(), bytes)?;
        Ok(())
    }

    /// Removes a pending interaction. Returns whether it existed.
    pub fn delete_pending(&self, id: Uuid) -> Result<bool> {
        Ok(self.pending.remove(id.as_bytes())?.is_some())
    }

    /// All pending interactions, unordered.
    pub fn list_pending(&self) -> Result<Vec<PendingInteraction>> {
        let mut interactions = Vec::new();
        for entry in self.pending.iter() {
            let (_, bytes) = entry?;
            interactions.push(serde_json::from_slice(&bytes)?);
        }
        Ok(interactions)
    }

    /// Number of unresolved pending interactions.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Flushes all pending writes to disk.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("profiles", &self.profiles.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReceiverResponse, SenderResponse};
    use chrono::Utc;

    fn sample_record(strikes: f64) -> StrikeRecord {
        StrikeRecord {
            timestamp: Utc::now(),
            category: "offensive".to_string(),
            severity: 3,
            message: "flagged text".to_string(),
            sender_response: Some(SenderResponse::JustJoking),
            receiver_response: Some(ReceiverResponse::Uncomfortable),
            strikes_added: strikes,
        }
    }

    fn sample_pending() -> PendingInteraction {
        PendingInteraction {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            sender_id: "alice".to_string(),
            receiver_id: "bob".to_string(),
            message: "flagged text".to_string(),
            detection_summary: "Highly offensive (offensive): \"x\"".to_string(),
            sender_response: None,
            receiver_response: None,
        }
    }

    #[test]
    fn profile_round_trip() {
        let storage = Storage::temporary().unwrap();
        assert!(storage.load_profile("alice").unwrap().is_none());

        let mut profile = UserStrikeProfile::empty("alice");
        profile.strikes = 2;
        storage.store_profile(&profile).unwrap();

        let loaded = storage.load_profile("alice").unwrap().unwrap();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn history_appends_in_order() {
        let storage = Storage::temporary().unwrap();
        storage.append_record("alice", &sample_record(0.5)).unwrap();
        storage.append_record("alice", &sample_record(2.0)).unwrap();

        let history = storage.load_history("alice").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].strikes_added, 0.5);
        assert_eq!(history[1].strikes_added, 2.0);
    }

    #[test]
    fn pending_store_load_delete() {
        let storage = Storage::temporary().unwrap();
        let interaction = sample_pending();
        let id = interaction.id;

        storage.store_pending(&interaction).unwrap();
        assert_eq!(storage.pending_count(), 1);
        assert_eq!(storage.load_pending(id).unwrap().unwrap(), interaction);

        assert!(storage.delete_pending(id).unwrap());
        assert!(!storage.delete_pending(id).unwrap());
        assert!(storage.load_pending(id).unwrap().is_none());
    }

    #[test]
    fn list_pending_returns_all() {
        let storage = Storage::temporary().unwrap();
        storage.store_pending(&sample_pending()).unwrap();
        storage.store_pending(&sample_pending()).unwrap();
        assert_eq!(storage.list_pending().unwrap().len(), 2);
    }

    #[test]
    fn overwrite_updates_pending_in_place() {
        let storage = Storage::temporary().unwrap();
        let mut interaction = sample_pending();
        storage.store_pending(&interaction).unwrap();

        interaction.sender_response = Some(SenderResponse::JustJoking);
        storage.store_pending(&interaction).unwrap();

        assert_eq!(storage.pending_count(), 1);
        let loaded = storage.load_pending(interaction.id).unwrap().unwrap();
        assert_eq!(loaded.sender_response, Some(SenderResponse::JustJoking));
    }
}
