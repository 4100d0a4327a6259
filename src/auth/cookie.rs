//! Session cookie and bearer token extraction

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;

use crate::configuration::{AuthSettings, TokenPrecedence};

/// Where the gate found the token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Cookie,
    Header,
}

/// HTTP-only, same-site strict cookie carrying the access token.
pub fn session_cookie(settings: &AuthSettings, token: &str) -> Cookie<'static> {
    Cookie::build(settings.cookie_name.clone(), token.to_string())
        .path("/")
        .http_only(true)
        .secure(settings.cookie_secure)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(settings.token_ttl_seconds))
        .finish()
}

/// Cookie that makes the browser drop the session cookie.
pub fn removal_cookie(settings: &AuthSettings) -> Cookie<'static> {
    let mut cookie = Cookie::build(settings.cookie_name.clone(), "")
        .path("/")
        .http_only(true)
        .secure(settings.cookie_secure)
        .same_site(SameSite::Strict)
        .finish();
    cookie.make_removal();
    cookie
}

fn cookie_token(req: &HttpRequest, name: &str) -> Option<String> {
    req.cookie(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Pick exactly one token for the request according to `token_precedence`.
pub fn extract_token(req: &HttpRequest, settings: &AuthSettings) -> Option<(String, TokenSource)> {
    let from_cookie = || cookie_token(req, &settings.cookie_name).map(|t| (t, TokenSource::Cookie));
    let from_header = || bearer_token(req).map(|t| (t, TokenSource::Header));

    match settings.token_precedence {
        TokenPrecedence::Cookie => from_cookie().or_else(from_header),
        TokenPrecedence::Header => from_header().or_else(from_cookie),
    }
}
