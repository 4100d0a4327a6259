/// Admin Routes
///
/// Account management behind the admin gate.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{Identity, IdentityChanges, UserProfile};
use crate::error::AppError;
use crate::routes::auth::{MessageResponse, UserResponse};
use crate::store::{IdentityCounts, IdentityFilter, Store};
use crate::validators::{validate_user_list, validate_user_update, UserListParams, UserUpdate};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_users: i64,
    pub active_users: i64,
    pub banned_users: i64,
    pub today_users: i64,
}

impl From<IdentityCounts> for UserStats {
    fn from(counts: IdentityCounts) -> Self {
        Self {
            total_users: counts.total,
            active_users: counts.active,
            banned_users: counts.banned,
            today_users: counts.created_since,
        }
    }
}

#[derive(Serialize)]
pub struct UserListResponse {
    pub success: bool,
    pub message: &'static str,
    pub users: Vec<UserProfile>,
    pub pagination: Pagination,
    pub meta: UserStats,
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

async fn load_user(store: &dyn Store, user_id: &str) -> Result<Identity, AppError> {
    let id = Uuid::parse_str(user_id).map_err(|_| user_not_found())?;
    store.find_identity_by_id(id).await?.ok_or_else(user_not_found)
}

/// Translate a validated admin update into column changes for `current`
///
/// - `emailVerified` stamps `email_verified_at` only if it is unset
/// - `banned: true` stamps `banned_at` and takes `banReason`; `banned: false`
///   clears both; `banReason` alone is ignored
/// - `restore` clears `deleted_at`, or is a conflict if the user is not deleted
pub fn changes_for(
    update: &UserUpdate,
    current: &Identity,
    now: DateTime<Utc>,
) -> Result<IdentityChanges, AppError> {
    let mut changes = IdentityChanges {
        name: update.name.clone(),
        role: update.role,
        ..Default::default()
    };

    if update.email_verified && current.email_verified_at.is_none() {
        changes.email_verified_at = Some(Some(now));
    }

    match update.banned {
        Some(true) => {
            changes.banned_at = Some(Some(now));
            changes.ban_reason = update.ban_reason.clone();
        }
        Some(false) => {
            changes.banned_at = Some(None);
            changes.ban_reason = Some(None);
        }
        None => {}
    }

    if update.restore {
        if !current.is_deleted() {
            return Err(AppError::Conflict("This user was not deleted".to_string()));
        }
        changes.deleted_at = Some(None);
    }

    Ok(changes)
}

/// Start of the current UTC day
fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// GET /api/admin/users
///
/// Query: `page` (default 1), `limit` (default 10, at most 100), `role`
/// (default `user`) and `search` over id, name and email. `meta` counts the
/// whole table regardless of the filter.
///
/// # Errors
/// - 400: page, limit or role out of range
pub async fn list_users(
    query: web::Query<UserListParams>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let query = validate_user_list(&query)?;
    let filter = IdentityFilter {
        role: query.role,
        search: query.search.clone(),
        offset: query.offset(),
        limit: query.limit,
        created_since: start_of_day(Utc::now()),
    };

    let listing = store.list_identities(&filter).await?;

    Ok(HttpResponse::Ok().json(UserListResponse {
        success: true,
        message: "Users fetched successfully",
        users: listing.identities.iter().map(Identity::profile).collect(),
        pagination: Pagination {
            total: listing.matching,
            page: query.page,
            limit: query.limit,
            total_pages: (listing.matching + query.limit - 1) / query.limit,
        },
        meta: listing.counts.into(),
    }))
}

/// GET /api/admin/users/{id}
pub async fn get_user(
    path: web::Path<String>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let identity = load_user(store.get_ref(), &path).await?;

    Ok(HttpResponse::Ok().json(UserResponse {
        success: true,
        message: "User fetched successfully",
        user: identity.profile(),
    }))
}

/// PATCH /api/admin/users/{id}
///
/// # Errors
/// - 400: validation errors
/// - 404: unknown user
/// - 409: `restore` on a user that is not deleted
pub async fn update_user(
    path: web::Path<String>,
    body: web::Json<Value>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let update = validate_user_update(&body)?;
    let current = load_user(store.get_ref(), &path).await?;
    let changes = changes_for(&update, &current, Utc::now())?;

    let updated = store
        .update_identity(current.id, &changes)
        .await?
        .ok_or_else(user_not_found)?;

    tracing::info!(user_id = %updated.id, "User updated by admin");

    Ok(HttpResponse::Ok().json(UserResponse {
        success: true,
        message: "User updated successfully",
        user: updated.profile(),
    }))
}

/// DELETE /api/admin/users/{id}
///
/// Soft delete. The account can still be restored by logging in within the
/// grace period, or by an admin at any time.
pub async fn delete_user(
    path: web::Path<String>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let current = load_user(store.get_ref(), &path).await?;
    if current.is_deleted() {
        return Err(AppError::Conflict("This user already deleted".to_string()));
    }

    store
        .update_identity(current.id, &IdentityChanges::soft_delete(Utc::now()))
        .await?
        .ok_or_else(user_not_found)?;

    tracing::info!(user_id = %current.id, "User soft-deleted by admin");

    Ok(HttpResponse::Ok().json(MessageResponse {
        success: true,
        message: "User deleted successfully",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use chrono::Duration;

    fn identity(now: DateTime<Utc>) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            role: Role::User,
            email_verified_at: None,
            banned_at: None,
            ban_reason: None,
            deleted_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_start_of_day_is_utc_midnight() {
        let now = DateTime::parse_from_rfc3339("2024-03-09T17:45:12Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(start_of_day(now).to_rfc3339(), "2024-03-09T00:00:00+00:00");
    }

    #[test]
    fn test_email_verified_keeps_existing_stamp() {
        let now = Utc::now();
        let update = UserUpdate {
            email_verified: true,
            ..Default::default()
        };

        let mut current = identity(now);
        assert_eq!(
            changes_for(&update, &current, now).unwrap().email_verified_at,
            Some(Some(now))
        );

        current.email_verified_at = Some(now - Duration::days(2));
        assert!(changes_for(&update, &current, now).unwrap().is_empty());
    }

    #[test]
    fn test_ban_and_unban() {
        let now = Utc::now();
        let current = identity(now);

        let ban = UserUpdate {
            banned: Some(true),
            ban_reason: Some(Some("spam".to_string())),
            ..Default::default()
        };
        let changes = changes_for(&ban, &current, now).unwrap();
        assert_eq!(changes.banned_at, Some(Some(now)));
        assert_eq!(changes.ban_reason, Some(Some("spam".to_string())));

        let unban = UserUpdate {
            banned: Some(false),
            ban_reason: Some(Some("ignored".to_string())),
            ..Default::default()
        };
        let changes = changes_for(&unban, &current, now).unwrap();
        assert_eq!(changes.banned_at, Some(None));
        assert_eq!(changes.ban_reason, Some(None));
    }

    #[test]
    fn test_ban_reason_without_banned_is_ignored() {
        let now = Utc::now();
        let update = UserUpdate {
            ban_reason: Some(Some("spam".to_string())),
            ..Default::default()
        };

        assert!(changes_for(&update, &identity(now), now).unwrap().is_empty());
    }

    #[test]
    fn test_restore_requires_deleted_user() {
        let now = Utc::now();
        let update = UserUpdate {
            restore: true,
            ..Default::default()
        };

        let mut current = identity(now);
        assert!(matches!(
            changes_for(&update, &current, now),
            Err(AppError::Conflict(_))
        ));

        current.deleted_at = Some(now - Duration::days(10));
        assert_eq!(changes_for(&update, &current, now).unwrap(), IdentityChanges::restore());
    }
}
