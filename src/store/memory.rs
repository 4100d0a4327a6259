use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Identity, IdentityChanges, NewIdentity};
use crate::error::StoreError;
use crate::store::{IdentityCounts, IdentityFilter, IdentityListing, RevocationRecord, Store};

/// Process-local store with the same semantics as `PgStore`
#[derive(Default)]
pub struct InMemoryStore {
    identities: RwLock<HashMap<Uuid, Identity>>,
    revocations: RwLock<HashMap<String, RevocationRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a fully formed identity in place, replacing any row with its id.
    pub async fn seed(&self, identity: Identity) {
        self.identities.write().await.insert(identity.id, identity);
    }

    pub async fn revocations(&self) -> Vec<RevocationRecord> {
        self.revocations.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let email = email.to_lowercase();
        Ok(self
            .identities
            .read()
            .await
            .values()
            .find(|i| i.email.to_lowercase() == email)
            .cloned())
    }

    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        Ok(self.identities.read().await.get(&id).cloned())
    }

    async fn insert_identity(&self, identity: &NewIdentity) -> Result<Identity, StoreError> {
        let mut identities = self.identities.write().await;
        let email = identity.email.to_lowercase();
        if identities.values().any(|i| i.email.to_lowercase() == email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }

        let now = Utc::now();
        let created = Identity {
            id: Uuid::new_v4(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            password_hash: identity.password_hash.clone(),
            role: identity.role,
            email_verified_at: None,
            banned_at: None,
            ban_reason: None,
            deleted_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        identities.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_identity(
        &self,
        id: Uuid,
        changes: &IdentityChanges,
    ) -> Result<Option<Identity>, StoreError> {
        let mut identities = self.identities.write().await;
        Ok(identities.get_mut(&id).map(|identity| {
            identity.apply(changes, Utc::now());
            identity.clone()
        }))
    }

    async fn list_identities(&self, filter: &IdentityFilter) -> Result<IdentityListing, StoreError> {
        let identities = self.identities.read().await;

        let counts = IdentityCounts {
            total: identities.len() as i64,
            active: identities.values().filter(|i| !i.is_banned()).count() as i64,
            banned: identities.values().filter(|i| i.is_banned()).count() as i64,
            created_since: identities
                .values()
                .filter(|i| i.created_at >= filter.created_since)
                .count() as i64,
        };

        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut matching: Vec<&Identity> = identities
            .values()
            .filter(|i| i.role == filter.role)
            .filter(|i| match &needle {
                Some(needle) => {
                    i.id.to_string().contains(needle.as_str())
                        || i.name.to_lowercase().contains(needle.as_str())
                        || i.email.to_lowercase().contains(needle.as_str())
                }
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let page = matching
            .iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .map(|i| (*i).clone())
            .collect();

        Ok(IdentityListing {
            identities: page,
            matching: matching.len() as i64,
            counts,
        })
    }

    async fn is_token_revoked(&self, token_hash: &str) -> Result<bool, StoreError> {
        Ok(self.revocations.read().await.contains_key(token_hash))
    }

    async fn insert_revocation(
        &self,
        token_hash: &str,
        expiry_date: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.revocations
            .write()
            .await
            .entry(token_hash.to_string())
            .or_insert_with(|| RevocationRecord {
                token_hash: token_hash.to_string(),
                expiry_date,
                revoked_at: Utc::now(),
            });
        Ok(())
    }

    async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut revocations = self.revocations.write().await;
        let before = revocations.len();
        revocations.retain(|_, record| record.expiry_date >= now);
        Ok((before - revocations.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn new_identity(email: &str) -> NewIdentity {
        NewIdentity {
            name: "Ada".to_string(),
            email: email.to_string(),
            password_hash: "$2b$04$hash".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let store = InMemoryStore::new();
        let created = store.insert_identity(&new_identity("ada@example.com")).await.unwrap();

        let found = store.find_identity_by_email("ADA@Example.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryStore::new();
        store.insert_identity(&new_identity("ada@example.com")).await.unwrap();

        let err = store.insert_identity(&new_identity("Ada@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_update_missing_identity_returns_none() {
        let store = InMemoryStore::new();
        let result = store
            .update_identity(Uuid::new_v4(), &IdentityChanges::restore())
            .await
            .unwrap();

        assert!(result.is_none());
    }

    fn filter(role: Role, search: Option<&str>, offset: i64, limit: i64) -> IdentityFilter {
        IdentityFilter {
            role,
            search: search.map(str::to_string),
            offset,
            limit,
            created_since: Utc::now() - chrono::Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn test_listing_pages_newest_first() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        for (n, days) in [(1, 3), (2, 2), (3, 1)] {
            let mut identity = store
                .insert_identity(&new_identity(&format!("user{}@example.com", n)))
                .await
                .unwrap();
            identity.created_at = now - chrono::Duration::days(days);
            store.seed(identity).await;
        }

        let first = store.list_identities(&filter(Role::User, None, 0, 2)).await.unwrap();
        let emails: Vec<&str> = first.identities.iter().map(|i| i.email.as_str()).collect();
        assert_eq!(emails, vec!["user3@example.com", "user2@example.com"]);
        assert_eq!(first.matching, 3);

        let second = store.list_identities(&filter(Role::User, None, 2, 2)).await.unwrap();
        assert_eq!(second.identities.len(), 1);
        assert_eq!(second.identities[0].email, "user1@example.com");
    }

    #[tokio::test]
    async fn test_listing_filters_but_counts_everyone() {
        let store = InMemoryStore::new();
        store.insert_identity(&new_identity("ada@example.com")).await.unwrap();
        let mut banned = store.insert_identity(&new_identity("bob@example.com")).await.unwrap();
        banned.banned_at = Some(Utc::now());
        banned.created_at = Utc::now() - chrono::Duration::days(5);
        store.seed(banned).await;
        let mut admin = new_identity("root@example.com");
        admin.role = Role::Admin;
        store.insert_identity(&admin).await.unwrap();

        let listing = store.list_identities(&filter(Role::User, Some("ADA"), 0, 10)).await.unwrap();
        assert_eq!(listing.identities.len(), 1);
        assert_eq!(listing.matching, 1);
        assert_eq!(
            listing.counts,
            IdentityCounts {
                total: 3,
                active: 2,
                banned: 1,
                created_since: 2,
            }
        );

        let admins = store.list_identities(&filter(Role::Admin, None, 0, 10)).await.unwrap();
        assert_eq!(admins.matching, 1);
        assert_eq!(admins.identities[0].email, "root@example.com");
    }

    #[tokio::test]
    async fn test_revocation_insert_keeps_first_record() {
        let store = InMemoryStore::new();
        let expiry = Utc::now() + chrono::Duration::hours(1);

        store.insert_revocation("digest", expiry).await.unwrap();
        store
            .insert_revocation("digest", expiry + chrono::Duration::hours(1))
            .await
            .unwrap();

        let records = store.revocations().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].expiry_date, expiry);
    }

    #[tokio::test]
    async fn test_purge_only_removes_expired() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.insert_revocation("old", now - chrono::Duration::minutes(1)).await.unwrap();
        store.insert_revocation("live", now + chrono::Duration::minutes(1)).await.unwrap();

        assert_eq!(store.purge_expired_revocations(now).await.unwrap(), 1);
        assert!(store.is_token_revoked("live").await.unwrap());
        assert!(!store.is_token_revoked("old").await.unwrap());
    }
}
