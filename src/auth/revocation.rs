//! Revocation Ledger
//!
//! Tokens invalidated by logout stay rejected until their own expiry, even
//! though their signature still checks out. Only the SHA-256 digest of the
//! token is stored. Every lookup is bounded by the configured store timeout,
//! and a timeout is reported as an error so callers reject the request.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

use crate::configuration::AuthSettings;
use crate::error::StoreError;
use crate::store::Store;

/// Hash a token using SHA-256
///
/// Never store plaintext tokens in the database.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct RevocationLedger {
    store: Arc<dyn Store>,
    timeout: std::time::Duration,
}

impl RevocationLedger {
    pub fn new(store: Arc<dyn Store>, settings: &AuthSettings) -> Self {
        Self {
            store,
            timeout: settings.store_timeout(),
        }
    }

    /// Whether `token` has been revoked
    ///
    /// # Errors
    /// `Timeout` if the store does not answer in time, or the store's own error
    pub async fn is_revoked(&self, token: &str) -> Result<bool, StoreError> {
        let digest = token_digest(token);
        tokio::time::timeout(self.timeout, self.store.is_token_revoked(&digest))
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    /// Revoke `token` until `expiry_date`. Revoking twice is a no-op.
    pub async fn revoke(&self, token: &str, expiry_date: DateTime<Utc>) -> Result<(), StoreError> {
        let digest = token_digest(token);
        tokio::time::timeout(self.timeout, self.store.insert_revocation(&digest, expiry_date))
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    /// Drop records for tokens that have expired on their own.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.store.purge_expired_revocations(now).await
    }
}

/// Periodically purge expired revocation records.
pub fn spawn_purge_task(ledger: Arc<RevocationLedger>, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match ledger.purge_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Purged expired revocation records"),
                Err(e) => tracing::warn!(error = %e, "Revocation purge failed"),
            }
        }
    })
}
