use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Note management and dashboard endpoints. The router is wrapped in the admin
/// layer, which authenticates and checks the role before extraction; every
/// handler also calls `require_role(Role::Admin)` before it reads or writes.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/categories/all
        // Existing category keys merged with the recommended list, for the editor dropdown.
        .route("/api/categories/all", get(handlers::get_all_categories))
        // GET /api/admin/notes
        // Every note, drafts included.
        .route("/api/admin/notes", get(handlers::get_admin_notes))
        // POST /api/note
        .route("/api/note", post(handlers::create_note))
        // PUT/DELETE /api/note/{id}
        // Shares its path with the public GET; the methods are merged.
        .route(
            "/api/note/{id}",
            put(handlers::update_note).delete(handlers::delete_note),
        )
        // GET /api/admin_stats
        .route("/api/admin_stats", get(handlers::get_admin_stats))
        // GET /api/note_views
        // Most viewed notes.
        .route("/api/note_views", get(handlers::get_note_views))
}
