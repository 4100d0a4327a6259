//! JWT claims carried by an access token
//!
//! Standard registered claims (RFC 7519) plus the account's email and role.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Identity, Role};
use crate::error::AuthError;

/// Identity fields embedded into a token at issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub id: Uuid,
    pub email: String,
    pub role: Option<Role>,
}

impl From<&Identity> for TokenSubject {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            role: Some(identity.role),
        }
    }
}

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub email: String,
    /// Absent on tokens minted for accounts without an explicit role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    /// Create claims for `subject` valid for `ttl` from `now`.
    pub fn new(subject: &TokenSubject, now: DateTime<Utc>, ttl: chrono::Duration, issuer: &str) -> Self {
        let iat = now.timestamp();
        Self {
            sub: subject.id.to_string(),
            email: subject.email.clone(),
            role: subject.role,
            exp: iat + ttl.num_seconds(),
            iat,
            iss: issuer.to_string(),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// Returns `Malformed` if the subject is not a valid UUID
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::Malformed)
    }

    pub fn subject(&self) -> Result<TokenSubject, AuthError> {
        Ok(TokenSubject {
            id: self.user_id()?,
            email: self.email.clone(),
            role: self.role,
        })
    }

    /// `exp` as a timestamp
    ///
    /// # Errors
    /// Returns `Malformed` if `exp` is outside the representable range
    pub fn expires_at(&self) -> Result<DateTime<Utc>, AuthError> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .ok_or(AuthError::Malformed)
    }

    /// Expired once `now` is past the `exp` second.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }
}
