use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::configuration::DatabaseSettings;
use crate::domain::{Identity, IdentityChanges, NewIdentity, Role};
use crate::error::StoreError;
use crate::store::{IdentityCounts, IdentityFilter, IdentityListing, Store};

const IDENTITY_COLUMNS: &str = "id, name, email, password_hash, role, email_verified_at, \
     banned_at, ban_reason, deleted_at, last_login_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    email_verified_at: Option<DateTime<Utc>>,
    banned_at: Option<DateTime<Utc>>,
    ban_reason: Option<String>,
    deleted_at: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IdentityRow> for Identity {
    type Error = StoreError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| StoreError::CorruptRow(format!("unknown role '{}' for user {}", row.role, row.id)))?;

        Ok(Identity {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            email_verified_at: row.email_verified_at,
            banned_at: row.banned_at,
            ban_reason: row.ban_reason,
            deleted_at: row.deleted_at,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Escape `%`, `_` and `\\` so user input matches literally inside `ILIKE`
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_identity_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &IdentityFilter) {
    builder.push(" WHERE role = ").push_bind(filter.role.as_str());
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        builder
            .push(" AND (id::text ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a connection pool for `settings`
    ///
    /// # Errors
    /// Returns `Unavailable` if the database cannot be reached
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(&settings.connection_string())
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Apply pending migrations from `./migrations`
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("migration failed: {}", e)))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1)",
            IDENTITY_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Identity::try_from).transpose()
    }

    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            IDENTITY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Identity::try_from).transpose()
    }

    async fn insert_identity(&self, identity: &NewIdentity) -> Result<Identity, StoreError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {}
            "#,
            IDENTITY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&identity.name)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(identity.role.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Identity::try_from(row)
    }

    async fn update_identity(
        &self,
        id: Uuid,
        changes: &IdentityChanges,
    ) -> Result<Option<Identity>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = ");
        builder.push_bind(Utc::now());

        if let Some(name) = &changes.name {
            builder.push(", name = ").push_bind(name.clone());
        }
        if let Some(role) = changes.role {
            builder.push(", role = ").push_bind(role.as_str());
        }
        if let Some(value) = changes.email_verified_at {
            builder.push(", email_verified_at = ").push_bind(value);
        }
        if let Some(value) = changes.banned_at {
            builder.push(", banned_at = ").push_bind(value);
        }
        if let Some(value) = &changes.ban_reason {
            builder.push(", ban_reason = ").push_bind(value.clone());
        }
        if let Some(value) = changes.deleted_at {
            builder.push(", deleted_at = ").push_bind(value);
        }
        if let Some(value) = changes.last_login_at {
            builder.push(", last_login_at = ").push_bind(value);
        }

        builder.push(" WHERE id = ").push_bind(id);
        builder.push(" RETURNING ").push(IDENTITY_COLUMNS);

        let row = builder
            .build_query_as::<IdentityRow>()
            .fetch_optional(&self.pool)
            .await?;

        row.map(Identity::try_from).transpose()
    }

    async fn list_identities(&self, filter: &IdentityFilter) -> Result<IdentityListing, StoreError> {
        let (total, active, banned, created_since) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE banned_at IS NULL),
                   COUNT(*) FILTER (WHERE banned_at IS NOT NULL),
                   COUNT(*) FILTER (WHERE created_at >= $1)
            FROM users
            "#,
        )
        .bind(filter.created_since)
        .fetch_one(&self.pool)
        .await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_identity_filter(&mut count, filter);
        let (matching,) = count.build_query_as::<(i64,)>().fetch_one(&self.pool).await?;

        let mut page = QueryBuilder::<Postgres>::new("SELECT ");
        page.push(IDENTITY_COLUMNS).push(" FROM users");
        push_identity_filter(&mut page, filter);
        page.push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);
        let rows = page
            .build_query_as::<IdentityRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(IdentityListing {
            identities: rows
                .into_iter()
                .map(Identity::try_from)
                .collect::<Result<_, _>>()?,
            matching,
            counts: IdentityCounts {
                total,
                active,
                banned,
                created_since,
            },
        })
    }

    async fn is_token_revoked(&self, token_hash: &str) -> Result<bool, StoreError> {
        let revoked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE token_hash = $1)",
        )
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(revoked)
    }

    async fn insert_revocation(
        &self,
        token_hash: &str,
        expiry_date: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (token_hash, expiry_date, revoked_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (token_hash) DO NOTHING
            "#,
        )
        .bind(token_hash)
        .bind(expiry_date)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expiry_date < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
