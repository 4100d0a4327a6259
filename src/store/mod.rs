//! Persistence layer
//!
//! The `Store` trait is the only way handlers and the auth gate reach
//! stored state. `PgStore` backs it with Postgres; `InMemoryStore` keeps
//! everything in process for tests and local runs.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Identity, IdentityChanges, NewIdentity, Role};
use crate::error::StoreError;

/// A revoked token, keyed by the SHA-256 digest of the token string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationRecord {
    pub token_hash: String,
    pub expiry_date: DateTime<Utc>,
    pub revoked_at: DateTime<Utc>,
}

/// Which identities to list and which page of them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityFilter {
    pub role: Role,
    /// Case-insensitive substring of id, name or email
    pub search: Option<String>,
    pub offset: i64,
    pub limit: i64,
    /// Accounts created at or after this instant count as new today
    pub created_since: DateTime<Utc>,
}

/// Counts over the whole users table, ignoring the filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityCounts {
    pub total: i64,
    pub active: i64,
    pub banned: i64,
    pub created_since: i64,
}

/// One page of a listing, newest accounts first
#[derive(Debug, Clone)]
pub struct IdentityListing {
    pub identities: Vec<Identity>,
    /// Rows matching role and search, across all pages
    pub matching: i64,
    pub counts: IdentityCounts,
}

#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Identity operations
    // =========================================================================

    /// Case-insensitive lookup by email
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    /// Create an account
    ///
    /// Fails with `UniqueViolation` when the email is taken.
    async fn insert_identity(&self, identity: &NewIdentity) -> Result<Identity, StoreError>;

    /// Apply `changes` and return the updated row, or `None` if no row has `id`
    async fn update_identity(
        &self,
        id: Uuid,
        changes: &IdentityChanges,
    ) -> Result<Option<Identity>, StoreError>;

    async fn list_identities(&self, filter: &IdentityFilter) -> Result<IdentityListing, StoreError>;

    // =========================================================================
    // Revocation ledger operations
    // =========================================================================

    async fn is_token_revoked(&self, token_hash: &str) -> Result<bool, StoreError>;

    /// Record a revocation; inserting an existing digest is a no-op
    async fn insert_revocation(
        &self,
        token_hash: &str,
        expiry_date: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Delete records whose `expiry_date` is before `now`
    ///
    /// Returns the number of deleted records
    async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
