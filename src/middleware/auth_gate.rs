/// Auth Gate Middleware
///
/// Resolves the caller's token, verifies it, consults the revocation ledger
/// and, for admin routes, checks the role. On success an `AuthContext` is
/// placed in request extensions for handlers to take via
/// `web::ReqData<AuthContext>`. Rejected requests never reach the handler.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::InternalError,
    Error, HttpMessage, HttpRequest, ResponseError,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::{extract_token, removal_cookie, AuthContext, AuthState};
use crate::configuration::AuthSettings;
use crate::domain::Role;
use crate::error::{AppError, AuthError};

/// Route guard
///
/// `AuthGate::user` only needs the identity to resolve; `AuthGate::admin`
/// additionally requires the `admin` role.
pub struct AuthGate {
    state: Arc<AuthState>,
    required_role: Option<Role>,
}

impl AuthGate {
    pub fn user(state: Arc<AuthState>) -> Self {
        Self {
            state,
            required_role: None,
        }
    }

    pub fn admin(state: Arc<AuthState>) -> Self {
        Self {
            state,
            required_role: Some(Role::Admin),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGateService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthGateService {
            service: Rc::new(service),
            state: self.state.clone(),
            required_role: self.required_role,
        }))
    }
}

pub struct AuthGateService<S> {
    service: Rc<S>,
    state: Arc<AuthState>,
    required_role: Option<Role>,
}

impl<S, B> Service<ServiceRequest> for AuthGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let state = self.state.clone();
        let required_role = self.required_role;

        Box::pin(async move {
            // Borrow only: routing inside a scope needs the request uniquely owned.
            let outcome = authenticate(&state, req.request(), required_role).await;

            match outcome {
                Ok(context) => {
                    tracing::debug!(
                        user_id = %context.user.id,
                        role = ?context.user.role,
                        path = %req.path(),
                        "Request authenticated"
                    );
                    req.extensions_mut().insert(context);
                    service.call(req).await
                }
                Err(e) => Err(reject(&state.settings, e)),
            }
        })
    }
}

/// Run the gate's checks for one request
///
/// Order: token extraction, signature and expiry, revocation, role.
///
/// # Errors
/// - `Auth(MissingToken)` when neither cookie nor bearer header carries a token
/// - `Auth(InvalidSignature | Expired | Malformed)` from verification
/// - `Auth(Revoked)` when the token is in the ledger
/// - `Store(Timeout | ..)` when the ledger cannot answer; the request is rejected
/// - `Auth(InsufficientRole)` when `required_role` does not match
pub async fn authenticate(
    state: &AuthState,
    req: &HttpRequest,
    required_role: Option<Role>,
) -> Result<AuthContext, AppError> {
    let (token, source) = extract_token(req, &state.settings).ok_or(AuthError::MissingToken)?;
    tracing::trace!(source = ?source, "Token extracted");

    let claims = state.issuer.verify(&token)?;
    let context = AuthContext::from_claims(&claims, token)?;

    if state.ledger.is_revoked(&context.access_token).await? {
        return Err(AuthError::Revoked.into());
    }

    if let Some(role) = required_role {
        if context.user.role != Some(role) {
            return Err(AuthError::InsufficientRole.into());
        }
    }

    Ok(context)
}

fn reject(settings: &AuthSettings, err: AppError) -> Error {
    let mut response = err.error_response();

    if let AppError::Auth(reason) = &err {
        if reason.clears_cookie() {
            if let Err(e) = response.add_cookie(&removal_cookie(settings)) {
                tracing::warn!(error = %e, "Failed to attach session removal cookie");
            }
        }
    }

    InternalError::from_response(err, response).into()
}
