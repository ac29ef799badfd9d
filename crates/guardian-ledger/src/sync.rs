//! Account store mirroring.
//!
//! The transport layer's account record mirrors each user's strike count and
//! profile fields. The mirror is opportunistic: the ledger's local copy stays
//! authoritative, and a failed mirror is logged, never propagated.

use crate::models::AccountAttributes;
use async_trait::async_trait;
use tracing::debug;

/// Seam to the external account store ("update account attributes" primitive).
#[async_trait]
pub trait AccountSync: Send + Sync {
    /// Push the given attributes onto the user's account record.
    async fn update_account(
        &self,
        user_id: &str,
        attributes: &AccountAttributes,
    ) -> std::result::Result<(), String>;
}

/// No-op account sync for deployments without an account store, and for
/// tests that only care about local ledger state.
#[derive(Debug, Default, Clone)]
pub struct NullAccountSync;

#[async_trait]
impl AccountSync for NullAccountSync {
    async fn update_account(
        &self,
        user_id: &str,
        attributes: &AccountAttributes,
    ) -> std::result::Result<(), String> {
        debug!(user_id, strikes = attributes.strikes, "account sync skipped (null sink)");
        Ok(())
    }
}
