/// Authentication Routes
///
/// Signup, login and logout.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::auth::{hash_password, removal_cookie, session_cookie, verify_password, AuthContext, AuthState, TokenSubject};
use crate::domain::{NewIdentity, Role, UserProfile};
use crate::error::{AppError, StoreError};
use crate::store::Store;
use crate::validators::{validate_login, validate_signup};

const EMAIL_TAKEN: &str = "This email has been already taken";

#[derive(Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: UserProfile,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: UserProfile,
    pub access_token: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

/// POST /auth/signup
///
/// Create an unverified `user` account.
///
/// # Errors
/// - 400: validation errors
/// - 409: email already registered
pub async fn signup(
    body: web::Json<Value>,
    store: web::Data<dyn Store>,
    auth: web::Data<AuthState>,
) -> Result<HttpResponse, AppError> {
    let data = validate_signup(&body)?;

    if store.find_identity_by_email(&data.email).await?.is_some() {
        return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
    }

    let cost = auth.settings.password_hash_cost;
    let password = data.password;
    let password_hash = web::block(move || hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))??;

    let identity = store
        .insert_identity(&NewIdentity {
            name: data.name,
            email: data.email,
            password_hash,
            role: Role::User,
        })
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation(_) => AppError::Conflict(EMAIL_TAKEN.to_string()),
            other => other.into(),
        })?;

    tracing::info!(user_id = %identity.id, "User signed up");

    Ok(HttpResponse::Created().json(UserResponse {
        success: true,
        message: "User created successfully",
        user: identity.profile(),
    }))
}

/// POST /auth/login
///
/// Verify credentials, run the account lifecycle checks, then issue a token
/// both in the body and as the session cookie.
///
/// # Errors
/// - 400: validation errors
/// - 404: no account with this email
/// - 401: wrong password
/// - 410: deleted longer than the grace period
/// - 403: banned or email not verified
pub async fn login(
    body: web::Json<Value>,
    store: web::Data<dyn Store>,
    auth: web::Data<AuthState>,
) -> Result<HttpResponse, AppError> {
    let credentials = validate_login(&body)?;

    let identity = store
        .find_identity_by_email(&credentials.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let password = credentials.password;
    let password_hash = identity.password_hash.clone();
    let matches = web::block(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password check task failed: {}", e)))?;
    if !matches {
        return Err(AppError::InvalidCredentials);
    }

    let identity = auth.lifecycle.admit(store.get_ref(), identity, Utc::now()).await?;
    let issued = auth.issuer.issue(&TokenSubject::from(&identity))?;

    tracing::info!(user_id = %identity.id, "User logged in");

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&auth.settings, &issued.token))
        .json(LoginResponse {
            success: true,
            message: "You are logged in successful",
            user: identity.profile(),
            access_token: issued.token,
        }))
}

/// POST /auth/logout
///
/// Revoke the presented token until its own expiry and clear the cookie.
pub async fn logout(
    context: web::ReqData<AuthContext>,
    auth: web::Data<AuthState>,
) -> Result<HttpResponse, AppError> {
    auth.ledger
        .revoke(&context.access_token, context.access_token_expiry)
        .await?;

    tracing::info!(user_id = %context.user.id, "User logged out");

    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(&auth.settings))
        .json(MessageResponse {
            success: true,
            message: "User logged out successfully",
        }))
}
