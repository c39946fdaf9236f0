use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Session management for any logged-in account, regardless of role.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/me
        .route("/api/me", get(handlers::get_me))
        // POST /api/logout
        // Revokes the presented token.
        .route("/api/logout", post(handlers::logout))
        // POST /api/change_password
        .route("/api/change_password", post(handlers::change_password))
}
