use crate::{
    AppState,
    auth::{self, AuthUser, require_role},
    categories::{self, CategoryEntry},
    error::{AppError, Result},
    models::{
        AdminStats, ChangePasswordRequest, CreateNoteRequest, Identity, LoginRequest,
        LoginResponse, MessageResponse, Note, NoteSummary, RegisterRequest, Role,
        UpdateNoteRequest,
    },
    repository::NewNote,
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;

/// Number of entries returned by the most-viewed dashboard panel.
pub const TOP_NOTES_LIMIT: i64 = 5;

// --- Filter Structs ---

/// NoteFilter
///
/// Query parameters for GET /api/notes. Empty values are treated as absent.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct NoteFilter {
    /// Exact category key.
    pub category: Option<String>,
    /// Case-insensitive substring matched against title or content.
    pub search: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required.")));
    }
    Ok(trimmed.to_string())
}

// --- Auth Handlers ---

/// register_user
///
/// [Public Route] Creates a regular `user` account.
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = Identity),
        (status = 400, description = "Invalid email or short password"),
        (status = 409, description = "Email or username taken")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Identity>)> {
    let identity = auth::register(
        state.repo.as_ref(),
        payload.username,
        &payload.email,
        &payload.password,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(identity)))
}

/// login
///
/// [Public Route] Exchanges email + password for a bearer token.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let session = auth::authenticate(
        state.repo.as_ref(),
        &state.config,
        &payload.email,
        &payload.password,
    )
    .await?;

    Ok(Json(LoginResponse {
        message: "Login successful!".to_string(),
        token: session.token,
        user: session.identity,
    }))
}

/// logout
///
/// [Authenticated Route] Revokes the presented token.
#[utoipa::path(
    post,
    path = "/api/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(user: AuthUser, State(state): State<AppState>) -> Result<Json<MessageResponse>> {
    auth::logout(state.repo.as_ref(), &user).await?;
    Ok(Json(MessageResponse::ok("Logged out successfully")))
}

/// change_password
///
/// [Authenticated Route] Self-service password change.
#[utoipa::path(
    post,
    path = "/api/change_password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Changed", body = MessageResponse),
        (status = 400, description = "Mismatch or too short"),
        (status = 401, description = "Current password incorrect")
    )
)]
pub async fn change_password(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    auth::change_password(
        state.repo.as_ref(),
        &user,
        &payload.current_password,
        &payload.new_password,
        &payload.confirm_password,
    )
    .await?;
    Ok(Json(MessageResponse::ok("Password changed successfully!")))
}

/// get_me
///
/// [Authenticated Route] The identity bound to the presented token.
#[utoipa::path(
    get,
    path = "/api/me",
    responses((status = 200, description = "Current identity", body = Identity))
)]
pub async fn get_me(user: AuthUser) -> Json<Identity> {
    Json(user.identity())
}

// --- Public Note Handlers ---

/// get_categories
///
/// [Public Route] The derived taxonomy as a flat array ordered by major group
/// (Medical, Surgical, Specialty, Other), then key.
#[utoipa::path(
    get,
    path = "/api/categories",
    responses((status = 200, description = "Taxonomy", body = [CategoryEntry]))
)]
pub async fn get_categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryEntry>>> {
    let counts = state.repo.category_counts().await?;
    Ok(Json(state.categories.aggregate(counts)))
}

/// get_notes
///
/// [Public Route] Published notes, optionally filtered, most recently updated first.
#[utoipa::path(
    get,
    path = "/api/notes",
    params(NoteFilter),
    responses((status = 200, description = "Published notes", body = [NoteSummary]))
)]
pub async fn get_notes(
    State(state): State<AppState>,
    Query(filter): Query<NoteFilter>,
) -> Result<Json<Vec<NoteSummary>>> {
    let notes = state
        .repo
        .list_notes(non_empty(filter.category), non_empty(filter.search))
        .await?;
    Ok(Json(notes))
}

/// get_note
///
/// [Public Route] One published note. Every successful fetch counts one view and
/// the response carries the post-increment counter.
#[utoipa::path(
    get,
    path = "/api/note/{id}",
    params(("id" = i64, Path, description = "Note ID")),
    responses(
        (status = 200, description = "Found", body = Note),
        (status = 404, description = "Absent or unpublished")
    )
)]
pub async fn get_note(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Note>> {
    let Path(id) = path?;
    state
        .repo
        .view_note(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

// --- Admin Handlers ---
//
// Every handler below calls `require_role` before touching the store, so a
// non-admin probing a nonexistent id sees 403, never 404.

/// get_all_categories
///
/// [Admin Route] Stored category keys merged with the recommended keys.
#[utoipa::path(
    get,
    path = "/api/categories/all",
    responses(
        (status = 200, description = "Category keys", body = [String]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn get_all_categories(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>> {
    require_role(&user, Role::Admin)?;
    let existing = state.repo.distinct_categories().await?;
    Ok(Json(categories::merge_with_recommended(existing)))
}

/// get_admin_notes
///
/// [Admin Route] Every note, including unpublished drafts.
#[utoipa::path(
    get,
    path = "/api/admin/notes",
    responses((status = 200, description = "All notes", body = [Note]))
)]
pub async fn get_admin_notes(user: AuthUser, State(state): State<AppState>) -> Result<Json<Vec<Note>>> {
    require_role(&user, Role::Admin)?;
    Ok(Json(state.repo.list_all_notes().await?))
}

/// create_note
///
/// [Admin Route] The author is always the caller.
#[utoipa::path(
    post,
    path = "/api/note",
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Created", body = Note),
        (status = 400, description = "Missing title, category or content")
    )
)]
pub async fn create_note(
    user: AuthUser,
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateNoteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Note>)> {
    require_role(&user, Role::Admin)?;
    let Json(payload) = payload?;

    let new_note = NewNote {
        title: required("Title", &payload.title)?,
        category: required("Category", &payload.category)?,
        content: required("Content", &payload.content)?,
        is_published: payload.is_published.unwrap_or(true),
        author_id: Some(user.id),
    };

    let note = state.repo.create_note(new_note).await?;
    tracing::info!(note_id = note.id, author_id = user.id, "note created");
    Ok((StatusCode::CREATED, Json(note)))
}

/// update_note
///
/// [Admin Route] Partial update; a field that is present must not be empty.
#[utoipa::path(
    put,
    path = "/api/note/{id}",
    params(("id" = i64, Path, description = "Note ID")),
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Updated", body = Note),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_note(
    user: AuthUser,
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<UpdateNoteRequest>, JsonRejection>,
) -> Result<Json<Note>> {
    require_role(&user, Role::Admin)?;
    let Path(id) = path?;
    let Json(payload) = payload?;

    let request = UpdateNoteRequest {
        title: payload.title.map(|v| required("Title", &v)).transpose()?,
        category: payload.category.map(|v| required("Category", &v)).transpose()?,
        content: payload.content.map(|v| required("Content", &v)).transpose()?,
        is_published: payload.is_published,
    };

    let note = state
        .repo
        .update_note(id, request)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(note_id = id, "note updated");
    Ok(Json(note))
}

/// delete_note
///
/// [Admin Route] Hard delete.
#[utoipa::path(
    delete,
    path = "/api/note/{id}",
    params(("id" = i64, Path, description = "Note ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_note(
    user: AuthUser,
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>> {
    require_role(&user, Role::Admin)?;
    let Path(id) = path?;

    if !state.repo.delete_note(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(note_id = id, "note deleted");
    Ok(Json(MessageResponse::ok("Note deleted successfully.")))
}

/// get_admin_stats
///
/// [Admin Route] Dashboard counters.
#[utoipa::path(
    get,
    path = "/api/admin_stats",
    responses((status = 200, description = "Stats", body = AdminStats))
)]
pub async fn get_admin_stats(user: AuthUser, State(state): State<AppState>) -> Result<Json<AdminStats>> {
    require_role(&user, Role::Admin)?;
    Ok(Json(state.repo.get_stats().await?))
}

/// get_note_views
///
/// [Admin Route] The most viewed notes, ties in insertion order.
#[utoipa::path(
    get,
    path = "/api/note_views",
    responses((status = 200, description = "Top notes", body = [NoteSummary]))
)]
pub async fn get_note_views(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<NoteSummary>>> {
    require_role(&user, Role::Admin)?;
    Ok(Json(state.repo.top_notes(TOP_NOTES_LIMIT).await?))
}
