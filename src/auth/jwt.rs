//! JWT Token Generation and Validation
//!
//! `TokenIssuer` holds the signing keys derived once from `AuthSettings`.
//! Issuing is a pure function of subject, secret and clock; nothing is
//! persisted.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenSubject};
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError};

/// A freshly signed token and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: chrono::Duration,
}

impl TokenIssuer {
    /// Build the issuer from settings
    ///
    /// # Errors
    /// Returns `Config` if the algorithm is not an HMAC one, the secret is
    /// empty or the TTL is not positive
    pub fn new(settings: &AuthSettings) -> Result<Self, AppError> {
        if !matches!(
            settings.jwt_algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AppError::Config(format!(
                "unsupported jwt_algorithm {:?}, expected HS256, HS384 or HS512",
                settings.jwt_algorithm
            )));
        }
        if settings.jwt_secret.is_empty() {
            return Err(AppError::Config("jwt_secret must not be empty".to_string()));
        }
        if settings.token_ttl_seconds <= 0 {
            return Err(AppError::Config("token_ttl_seconds must be positive".to_string()));
        }

        Ok(Self {
            algorithm: settings.jwt_algorithm,
            encoding_key: EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
            issuer: settings.issuer.clone(),
            ttl: settings.token_ttl(),
        })
    }

    /// Sign a token for `subject` using the configured TTL.
    pub fn issue(&self, subject: &TokenSubject) -> Result<IssuedToken, AppError> {
        self.issue_at(subject, self.ttl, Utc::now())
    }

    /// Sign a token for `subject` valid for `ttl` starting at `now`.
    pub fn issue_at(
        &self,
        subject: &TokenSubject,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        let claims = Claims::new(subject, now, ttl, &self.issuer);
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        let expires_at = claims
            .expires_at()
            .map_err(|_| AppError::Internal("Token expiry out of range".to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature, issuer and expiry against the current time.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as of `now`
    ///
    /// # Errors
    /// - `InvalidSignature` when the signature does not match the secret
    /// - `Expired` when `now` is at or past the embedded `exp`
    /// - `Malformed` for anything else (bad encoding, wrong issuer, missing claims)
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is checked below against the supplied clock, without leeway.
        validation.validate_exp = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Malformed,
            })?;

        claims.expires_at()?;
        if claims.is_expired_at(now) {
            return Err(AuthError::Expired);
        }
        claims.user_id()?;

        Ok(claims)
    }
}
