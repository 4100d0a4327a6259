#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;

use chrono::Utc;
use reqwest::header::SET_COOKIE;
use serde_json::{json, Value};
use uuid::Uuid;
use vps_admin::auth::{hash_password, TokenIssuer, TokenSubject};
use vps_admin::configuration::AuthSettings;
use vps_admin::domain::{Identity, Role};
use vps_admin::startup::run;
use vps_admin::store::InMemoryStore;

pub const PASSWORD: &str = "SecurePass123";

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub settings: AuthSettings,
    pub client: reqwest::Client,
}

pub fn test_settings() -> AuthSettings {
    let mut settings = AuthSettings::with_secret("integration-test-secret");
    settings.password_hash_cost = 4;
    settings.revocation_purge_interval_seconds = 0;
    settings
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_settings()).await
}

pub async fn spawn_app_with(settings: AuthSettings) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = Arc::new(InMemoryStore::new());
    let server = run(listener, store.clone(), settings.clone()).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        settings,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    /// Store a verified account with `PASSWORD`, adjusted by `adjust` before insert.
    pub async fn seed_user(&self, email: &str, role: Role, adjust: impl FnOnce(&mut Identity)) -> Identity {
        let now = Utc::now();
        let mut identity = Identity {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: email.to_string(),
            password_hash: hash_password(PASSWORD, 4).expect("Failed to hash password"),
            role,
            email_verified_at: Some(now),
            banned_at: None,
            ban_reason: None,
            deleted_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        adjust(&mut identity);
        self.store.seed(identity.clone()).await;
        identity
    }

    pub fn issuer(&self) -> TokenIssuer {
        TokenIssuer::new(&self.settings).expect("Failed to build token issuer")
    }

    /// Token for `identity` signed with the server's secret, without logging in.
    pub fn token_for(&self, identity: &Identity) -> String {
        self.issuer()
            .issue(&TokenSubject::from(identity))
            .expect("Failed to issue token")
            .token
    }

    pub async fn post_login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}/auth/login", &self.address))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn login_token(&self, email: &str) -> String {
        let response = self.post_login(email, PASSWORD).await;
        assert_eq!(200, response.status().as_u16());
        let body: Value = response.json().await.expect("Failed to parse response");
        body["accessToken"].as_str().expect("accessToken missing").to_string()
    }

    pub async fn get_with_bearer(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(&format!("{}{}", &self.address, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_logout(&self, token: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}/auth/logout", &self.address))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

/// The `Set-Cookie` header for the session cookie, if the response carries one.
pub fn session_set_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("access_token="))
        .map(str::to_string)
}
