mod admin;
mod auth;
mod health_check;
mod user;

pub use admin::{delete_user, get_user, list_users, update_user};
pub use auth::{login, logout, signup};
pub use health_check::health_check;
pub use user::current_user;
