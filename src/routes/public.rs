use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Read-only access to published notes, plus the login and registration gateways.
/// Unpublished notes are filtered out at the repository level.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe.
        .route("/health", get(|| async { "ok" }))
        // POST /api/register
        // Creates a regular user account.
        .route("/api/register", post(handlers::register_user))
        // POST /api/login
        // Email + password in, bearer token out.
        .route("/api/login", post(handlers::login))
        // GET /api/categories
        // Category taxonomy with per-category note counts.
        .route("/api/categories", get(handlers::get_categories))
        // GET /api/notes?category=...&search=...
        .route("/api/notes", get(handlers::get_notes))
        // GET /api/note/{id}
        // Counts a view on every successful fetch.
        .route("/api/note/{id}", get(handlers::get_note))
}
