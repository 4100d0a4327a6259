//! Identity attached to a request that passed the auth gate

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::domain::Role;
use crate::error::AuthError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Immutable per-request authentication context
///
/// Built by the gate and handed to handlers through request extensions
/// (`web::ReqData<AuthContext>`). Handlers never see requests without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user: AuthUser,
    pub access_token: String,
    pub access_token_expiry: DateTime<Utc>,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims, access_token: String) -> Result<Self, AuthError> {
        Ok(Self {
            user: AuthUser {
                id: claims.user_id()?,
                email: claims.email.clone(),
                role: claims.role,
            },
            access_token,
            access_token_expiry: claims.expires_at()?,
        })
    }
}
