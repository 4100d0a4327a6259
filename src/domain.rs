//! Account identity model
//!
//! Only the fields the authentication flow touches live here. The password
//! hash stays on `Identity` and never leaves through `UserProfile`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored user account.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub banned_at: Option<DateTime<Utc>>,
    pub ban_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    pub fn is_banned(&self) -> bool {
        self.banned_at.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }

    /// Apply a change set in memory, the same way the SQL update does.
    pub fn apply(&mut self, changes: &IdentityChanges, now: DateTime<Utc>) {
        if let Some(name) = &changes.name {
            self.name = name.clone();
        }
        if let Some(role) = changes.role {
            self.role = role;
        }
        if let Some(value) = changes.email_verified_at {
            self.email_verified_at = value;
        }
        if let Some(value) = changes.banned_at {
            self.banned_at = value;
        }
        if let Some(value) = &changes.ban_reason {
            self.ban_reason = value.clone();
        }
        if let Some(value) = changes.deleted_at {
            self.deleted_at = value;
        }
        if let Some(value) = changes.last_login_at {
            self.last_login_at = Some(value);
        }
        self.updated_at = now;
    }
}

/// Public view of an account, safe to serialize into responses.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub banned_at: Option<DateTime<Utc>>,
    pub ban_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Identity> for UserProfile {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: identity.role,
            email_verified_at: identity.email_verified_at,
            banned_at: identity.banned_at,
            ban_reason: identity.ban_reason.clone(),
            deleted_at: identity.deleted_at,
            last_login_at: identity.last_login_at,
            created_at: identity.created_at,
            updated_at: identity.updated_at,
        }
    }
}

/// Input for creating an account at signup.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial update of an identity row.
///
/// Outer `None` leaves the column untouched; `Some(None)` clears a nullable
/// column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityChanges {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub email_verified_at: Option<Option<DateTime<Utc>>>,
    pub banned_at: Option<Option<DateTime<Utc>>>,
    pub ban_reason: Option<Option<String>>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl IdentityChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn restore() -> Self {
        Self {
            deleted_at: Some(None),
            ..Default::default()
        }
    }

    pub fn soft_delete(at: DateTime<Utc>) -> Self {
        Self {
            deleted_at: Some(Some(at)),
            ..Default::default()
        }
    }

    pub fn login(at: DateTime<Utc>) -> Self {
        Self {
            last_login_at: Some(at),
            ..Default::default()
        }
    }
}
