/// Middleware module
///
/// Route guards that authenticate and authorize requests before handlers run.

mod auth_gate;

pub use auth_gate::{authenticate, AuthGate};
