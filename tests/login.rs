mod common;

use chrono::{Duration, Utc};
use common::{session_set_cookie, spawn_app, PASSWORD};
use serde_json::{json, Value};
use vps_admin::domain::Role;
use vps_admin::store::Store;

#[tokio::test]
async fn login_returns_200_and_a_token_for_the_account() {
    let app = spawn_app().await;
    let user = app.seed_user("john@example.com", Role::User, |_| {}).await;

    let response = app.post_login("john@example.com", PASSWORD).await;
    assert_eq!(200, response.status().as_u16());

    let cookie = session_set_cookie(&response).expect("session cookie missing");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Max-Age=86400"));

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["id"], user.id.to_string());
    assert!(body["user"].get("passwordHash").is_none());

    let token = body["accessToken"].as_str().unwrap();
    assert!(cookie.starts_with(&format!("access_token={}", token)));

    let claims = app.issuer().verify(token).expect("token should verify");
    assert_eq!(claims.user_id().unwrap(), user.id);
    assert_eq!(claims.email, "john@example.com");
    assert_eq!(claims.role, Some(Role::User));

    let stored = app.store.find_identity_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.last_login_at.is_some());
}

#[tokio::test]
async fn login_email_is_case_insensitive() {
    let app = spawn_app().await;
    app.seed_user("john@example.com", Role::User, |_| {}).await;

    let response = app.post_login("  John@Example.COM ", PASSWORD).await;
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn login_returns_401_for_wrong_password_whatever_the_account_state() {
    let app = spawn_app().await;
    let now = Utc::now();

    app.seed_user("active@example.com", Role::User, |_| {}).await;
    app.seed_user("banned@example.com", Role::User, |u| u.banned_at = Some(now)).await;
    app.seed_user("unverified@example.com", Role::User, |u| u.email_verified_at = None).await;
    app.seed_user("gone@example.com", Role::User, |u| u.deleted_at = Some(now - Duration::days(5))).await;
    let recent = app
        .seed_user("recent@example.com", Role::User, |u| u.deleted_at = Some(now - Duration::days(1)))
        .await;

    for email in [
        "active@example.com",
        "banned@example.com",
        "unverified@example.com",
        "gone@example.com",
        "recent@example.com",
    ] {
        let response = app.post_login(email, "WrongPassword123").await;
        assert_eq!(401, response.status().as_u16(), "account {}", email);
        assert!(session_set_cookie(&response).is_none());

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Invalid Credentials");
    }

    // A failed password check must not restore anything.
    let stored = app.store.find_identity_by_id(recent.id).await.unwrap().unwrap();
    assert!(stored.deleted_at.is_some());
}

#[tokio::test]
async fn login_returns_404_for_unknown_email() {
    let app = spawn_app().await;

    let response = app.post_login("nobody@example.com", PASSWORD).await;
    assert_eq!(404, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn login_restores_account_deleted_one_day_ago() {
    let app = spawn_app().await;
    let user = app
        .seed_user("john@example.com", Role::User, |u| {
            u.deleted_at = Some(Utc::now() - Duration::days(1))
        })
        .await;

    let response = app.post_login("john@example.com", PASSWORD).await;
    assert_eq!(200, response.status().as_u16());

    let stored = app.store.find_identity_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.deleted_at.is_none());
}

#[tokio::test]
async fn login_returns_410_when_deleted_past_grace_period() {
    let app = spawn_app().await;
    let user = app
        .seed_user("john@example.com", Role::User, |u| {
            u.deleted_at = Some(Utc::now() - Duration::days(5))
        })
        .await;

    let response = app.post_login("john@example.com", PASSWORD).await;
    assert_eq!(410, response.status().as_u16());
    assert!(session_set_cookie(&response).is_none());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "User was deleted, for restore contact to admin support");

    let stored = app.store.find_identity_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.deleted_at, user.deleted_at);
}

#[tokio::test]
async fn login_returns_403_for_unverified_email_even_after_restore() {
    let app = spawn_app().await;
    let user = app
        .seed_user("john@example.com", Role::User, |u| {
            u.email_verified_at = None;
            u.deleted_at = Some(Utc::now() - Duration::days(1));
        })
        .await;

    let response = app.post_login("john@example.com", PASSWORD).await;
    assert_eq!(403, response.status().as_u16());
    assert!(session_set_cookie(&response).is_none());

    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Your account was restored. Please verify your email to login."
    );

    let stored = app.store.find_identity_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.deleted_at.is_none());
    assert!(stored.last_login_at.is_none());

    let response = app.post_login("john@example.com", PASSWORD).await;
    assert_eq!(403, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Please verify your email before logging in.");
}

#[tokio::test]
async fn login_returns_403_for_banned_account() {
    let app = spawn_app().await;
    app.seed_user("john@example.com", Role::User, |u| {
        u.banned_at = Some(Utc::now());
        u.ban_reason = Some("spam".to_string());
    })
    .await;

    let response = app.post_login("john@example.com", PASSWORD).await;
    assert_eq!(403, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Your account has been banned: spam");
}

#[tokio::test]
async fn login_returns_400_for_invalid_payloads() {
    let app = spawn_app().await;

    let test_cases = vec![
        (json!({ "password": PASSWORD }), "missing email"),
        (json!({ "email": "john@example.com" }), "missing password"),
        (json!({ "email": "not-an-email", "password": PASSWORD }), "invalid email"),
        (json!({ "email": "john@example.com", "password": "" }), "empty password"),
        (
            json!({ "email": "john@example.com", "password": PASSWORD, "remember": true }),
            "unknown key",
        ),
        (json!(["john@example.com", PASSWORD]), "not an object"),
    ];

    for (body, description) in test_cases {
        let response = app
            .client
            .post(&format!("{}/auth/login", &app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(400, response.status().as_u16(), "case: {}", description);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false, "case: {}", description);
        assert_eq!(body["code"], "VALIDATION_ERROR", "case: {}", description);
    }
}

#[tokio::test]
async fn login_returns_400_envelope_for_malformed_json() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(&format!("{}/auth/login", &app.address))
        .header("Content-Type", "application/json")
        .body("{\"email\": ")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}
