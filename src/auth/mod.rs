/// Authentication module
///
/// Password checks, token issuance and verification, the revocation ledger,
/// the login-time lifecycle guard and the per-request context the auth gate
/// hands to handlers.

mod claims;
mod context;
mod cookie;
mod jwt;
mod lifecycle;
mod password;
mod revocation;

use std::sync::Arc;

pub use claims::{Claims, TokenSubject};
pub use context::{AuthContext, AuthUser};
pub use cookie::{extract_token, removal_cookie, session_cookie, TokenSource};
pub use jwt::{IssuedToken, TokenIssuer};
pub use lifecycle::{AccountLifecycleGuard, Assessment, LoginRejection};
pub use password::{hash_password, verify_password};
pub use revocation::{spawn_purge_task, token_digest, RevocationLedger};

use crate::configuration::AuthSettings;
use crate::error::AppError;
use crate::store::Store;

/// Everything the auth gate and the auth handlers share
///
/// Built once at startup; immutable afterwards.
pub struct AuthState {
    pub settings: AuthSettings,
    pub issuer: TokenIssuer,
    pub ledger: Arc<RevocationLedger>,
    pub lifecycle: AccountLifecycleGuard,
}

impl AuthState {
    /// # Errors
    /// Returns `Config` when the token settings are unusable
    pub fn new(store: Arc<dyn Store>, settings: AuthSettings) -> Result<Self, AppError> {
        Ok(Self {
            issuer: TokenIssuer::new(&settings)?,
            ledger: Arc::new(RevocationLedger::new(store, &settings)),
            lifecycle: AccountLifecycleGuard::new(&settings),
            settings,
        })
    }
}
