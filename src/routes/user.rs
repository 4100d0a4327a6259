use actix_web::{web, HttpResponse};

use crate::auth::AuthContext;
use crate::error::AppError;
use crate::routes::auth::UserResponse;
use crate::store::Store;

/// GET /api/user
///
/// Profile of the authenticated caller.
pub async fn current_user(
    context: web::ReqData<AuthContext>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let identity = store
        .find_identity_by_id(context.user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(UserResponse {
        success: true,
        message: "User fetched successfully",
        user: identity.profile(),
    }))
}
