use actix_web::dev::Server;
use actix_web::{web, App, HttpResponse, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{spawn_purge_task, AuthState};
use crate::configuration::AuthSettings;
use crate::error::{json_error_handler, AppError};
use crate::logger::RequestLogger;
use crate::middleware::AuthGate;
use crate::routes::{
    current_user, delete_user, get_user, health_check, list_users, login, logout, signup, update_user,
};
use crate::store::Store;

async fn route_not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound("Route not found".to_string()))
}

/// Assemble the HTTP server on `listener`
///
/// Also starts the revocation purge task unless its interval is 0. Must be
/// called from inside a tokio runtime.
///
/// # Errors
/// `InvalidInput` if the auth settings are unusable, or the bind error
pub fn run(
    listener: TcpListener,
    store: Arc<dyn Store>,
    settings: AuthSettings,
) -> Result<Server, std::io::Error> {
    let purge_every = settings.revocation_purge_interval_seconds;
    let state = Arc::new(
        AuthState::new(store.clone(), settings)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?,
    );

    if purge_every > 0 {
        spawn_purge_task(state.ledger.clone(), std::time::Duration::from_secs(purge_every));
    }

    let store_data: web::Data<dyn Store> = web::Data::from(store);
    let state_data: web::Data<AuthState> = web::Data::from(state.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            // Shared state
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(store_data.clone())
            .app_data(state_data.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(signup))
                    .route("/login", web::post().to(login))
                    .service(
                        web::resource("/logout")
                            .wrap(AuthGate::user(state.clone()))
                            .route(web::post().to(logout)),
                    ),
            )
            // Admin scope must be registered before the broader /api scope
            .service(
                web::scope("/api/admin")
                    .wrap(AuthGate::admin(state.clone()))
                    .route("/users", web::get().to(list_users))
                    .route("/users/{id}", web::get().to(get_user))
                    .route("/users/{id}", web::patch().to(update_user))
                    .route("/users/{id}", web::delete().to(delete_user)),
            )
            .service(
                web::scope("/api")
                    .wrap(AuthGate::user(state.clone()))
                    .route("/user", web::get().to(current_user)),
            )
            .default_service(web::route().to(route_not_found))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
