use config::ConfigError;
use jsonwebtoken::Algorithm;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub auth: AuthSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Which request slot the auth gate reads the bearer token from first.
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenPrecedence {
    #[default]
    Cookie,
    Header,
}

/// Authentication settings
///
/// Built once at startup and handed to the token issuer, the revocation
/// ledger and every auth gate. Nothing below the `main` function reads the
/// environment directly.
#[derive(serde::Deserialize, Clone, Debug)]
pub struct AuthSettings {
    pub jwt_secret: String,
    #[serde(default = "default_algorithm")]
    pub jwt_algorithm: Algorithm,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: i64,   // seconds (86400 = 1 day)
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_true")]
    pub cookie_secure: bool,
    #[serde(default)]
    pub token_precedence: TokenPrecedence,
    #[serde(default = "default_grace_days")]
    pub deletion_grace_days: i64,
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_hash_cost")]
    pub password_hash_cost: u32,
    #[serde(default = "default_purge_interval")]
    pub revocation_purge_interval_seconds: u64,
}

impl AuthSettings {
    /// Settings with every optional field at its default.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            jwt_algorithm: default_algorithm(),
            issuer: default_issuer(),
            token_ttl_seconds: default_token_ttl(),
            cookie_name: default_cookie_name(),
            cookie_secure: true,
            token_precedence: TokenPrecedence::default(),
            deletion_grace_days: default_grace_days(),
            store_timeout_ms: default_store_timeout(),
            password_hash_cost: default_hash_cost(),
            revocation_purge_interval_seconds: default_purge_interval(),
        }
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_ttl_seconds)
    }

    pub fn deletion_grace(&self) -> chrono::Duration {
        chrono::Duration::days(self.deletion_grace_days)
    }

    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_algorithm() -> Algorithm {
    Algorithm::HS256
}

fn default_issuer() -> String {
    "vps-admin".to_string()
}

fn default_token_ttl() -> i64 {
    60 * 60 * 24
}

fn default_cookie_name() -> String {
    "access_token".to_string()
}

fn default_true() -> bool {
    true
}

fn default_grace_days() -> i64 {
    3
}

fn default_store_timeout() -> u64 {
    5_000
}

fn default_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_purge_interval() -> u64 {
    60 * 60
}

/// Load settings from `configuration.yaml` (optional) and `APP__*` variables.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
