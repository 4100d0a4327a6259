//! Account Lifecycle Guard
//!
//! Runs during login after the password matched and before a token is
//! minted. Order of checks:
//!
//! 1. soft-deleted longer than the grace period -> `Gone`
//! 2. soft-deleted within the grace period -> restored (written immediately)
//! 3. banned -> `Forbidden`
//! 4. email not verified -> `Forbidden`, even right after a restore
//! 5. `last_login_at` is stamped
//!
//! Login is therefore not side-effect free: a rejected attempt may still
//! have restored the account.

use chrono::{DateTime, Utc};

use crate::configuration::AuthSettings;
use crate::domain::{Identity, IdentityChanges};
use crate::error::AppError;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginRejection {
    Gone,
    Banned(Option<String>),
    Unverified { restored: bool },
}

impl From<LoginRejection> for AppError {
    fn from(rejection: LoginRejection) -> Self {
        match rejection {
            LoginRejection::Gone => {
                AppError::Gone("User was deleted, for restore contact to admin support".to_string())
            }
            LoginRejection::Banned(Some(reason)) => {
                AppError::Forbidden(format!("Your account has been banned: {}", reason))
            }
            LoginRejection::Banned(None) => {
                AppError::Forbidden("Your account has been banned".to_string())
            }
            LoginRejection::Unverified { restored: true } => AppError::Forbidden(
                "Your account was restored. Please verify your email to login.".to_string(),
            ),
            LoginRejection::Unverified { restored: false } => {
                AppError::Forbidden("Please verify your email before logging in.".to_string())
            }
        }
    }
}

/// What login should do with an account whose password just matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    /// Clear `deleted_at` before answering.
    pub restore: bool,
    pub outcome: Result<(), LoginRejection>,
}

pub struct AccountLifecycleGuard {
    grace: chrono::Duration,
}

impl AccountLifecycleGuard {
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            grace: settings.deletion_grace(),
        }
    }

    /// Decide the login outcome without touching the store.
    pub fn assess(&self, identity: &Identity, now: DateTime<Utc>) -> Assessment {
        let mut restore = false;

        if let Some(deleted_at) = identity.deleted_at {
            if now - deleted_at > self.grace {
                return Assessment {
                    restore: false,
                    outcome: Err(LoginRejection::Gone),
                };
            }
            restore = true;
        }

        let outcome = if identity.is_banned() {
            Err(LoginRejection::Banned(identity.ban_reason.clone()))
        } else if !identity.is_email_verified() {
            Err(LoginRejection::Unverified { restored: restore })
        } else {
            Ok(())
        };

        Assessment { restore, outcome }
    }

    /// Apply the assessment to the store and return the admitted identity
    ///
    /// # Errors
    /// - `Gone` / `Forbidden` per the lifecycle rules
    /// - `NotFound` if the row disappeared mid-login
    /// - store errors
    pub async fn admit(
        &self,
        store: &dyn Store,
        identity: Identity,
        now: DateTime<Utc>,
    ) -> Result<Identity, AppError> {
        let assessment = self.assess(&identity, now);

        if assessment.restore {
            store
                .update_identity(identity.id, &IdentityChanges::restore())
                .await?
                .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
            tracing::info!(user_id = %identity.id, "Soft-deleted account restored by login");
        }

        assessment.outcome?;

        store
            .update_identity(identity.id, &IdentityChanges::login(now))
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewIdentity, Role};
    use crate::store::InMemoryStore;
    use chrono::Duration;
    use uuid::Uuid;

    fn guard() -> AccountLifecycleGuard {
        AccountLifecycleGuard::new(&AuthSettings::with_secret("secret"))
    }

    fn identity(now: DateTime<Utc>) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            role: Role::User,
            email_verified_at: Some(now - Duration::days(30)),
            banned_at: None,
            ban_reason: None,
            deleted_at: None,
            last_login_at: None,
            created_at: now - Duration::days(30),
            updated_at: now - Duration::days(30),
        }
    }

    #[test]
    fn test_active_account_is_admitted() {
        let now = Utc::now();
        let assessment = guard().assess(&identity(now), now);

        assert_eq!(assessment, Assessment { restore: false, outcome: Ok(()) });
    }

    #[test]
    fn test_deleted_within_grace_is_restored() {
        let now = Utc::now();
        let mut account = identity(now);
        account.deleted_at = Some(now - Duration::days(1));

        let assessment = guard().assess(&account, now);
        assert!(assessment.restore);
        assert_eq!(assessment.outcome, Ok(()));
    }

    #[test]
    fn test_deleted_past_grace_is_gone() {
        let now = Utc::now();
        let mut account = identity(now);
        account.deleted_at = Some(now - Duration::days(5));

        let assessment = guard().assess(&account, now);
        assert!(!assessment.restore);
        assert_eq!(assessment.outcome, Err(LoginRejection::Gone));
    }

    #[test]
    fn test_grace_boundary() {
        let now = Utc::now();
        let mut account = identity(now);

        account.deleted_at = Some(now - Duration::days(3));
        assert!(guard().assess(&account, now).restore);

        account.deleted_at = Some(now - Duration::days(3) - Duration::seconds(1));
        assert_eq!(guard().assess(&account, now).outcome, Err(LoginRejection::Gone));
    }

    #[test]
    fn test_gone_takes_precedence_over_ban() {
        let now = Utc::now();
        let mut account = identity(now);
        account.deleted_at = Some(now - Duration::days(10));
        account.banned_at = Some(now - Duration::days(20));

        assert_eq!(guard().assess(&account, now).outcome, Err(LoginRejection::Gone));
    }

    #[test]
    fn test_banned_account_is_rejected() {
        let now = Utc::now();
        let mut account = identity(now);
        account.banned_at = Some(now);
        account.ban_reason = Some("spam".to_string());

        assert_eq!(
            guard().assess(&account, now).outcome,
            Err(LoginRejection::Banned(Some("spam".to_string())))
        );
    }

    #[test]
    fn test_unverified_after_restore() {
        let now = Utc::now();
        let mut account = identity(now);
        account.email_verified_at = None;
        account.deleted_at = Some(now - Duration::hours(2));

        let assessment = guard().assess(&account, now);
        assert!(assessment.restore);
        assert_eq!(assessment.outcome, Err(LoginRejection::Unverified { restored: true }));
    }

    #[tokio::test]
    async fn test_admit_restores_even_when_rejected() {
        let store = InMemoryStore::new();
        let created = store
            .insert_identity(&NewIdentity {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "$2b$04$hash".to_string(),
                role: Role::User,
            })
            .await
            .unwrap();
        let now = Utc::now();
        let deleted = store
            .update_identity(created.id, &IdentityChanges::soft_delete(now - Duration::days(1)))
            .await
            .unwrap()
            .unwrap();

        let result = guard().admit(&store, deleted, now).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let stored = store.find_identity_by_id(created.id).await.unwrap().unwrap();
        assert!(stored.deleted_at.is_none());
        assert!(stored.last_login_at.is_none());
    }

    #[tokio::test]
    async fn test_admit_stamps_last_login() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let account = identity(now);
        store.seed(account.clone()).await;

        let admitted = guard().admit(&store, account, now).await.unwrap();
        assert_eq!(admitted.last_login_at, Some(now));
    }
}
