use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Roles ---

/// Role
///
/// The two authorization roles. Checks are exact-match only: there is no hierarchy,
/// so an admin does not implicitly satisfy a check declared for `user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(value)),
        }
    }
}

// --- Core Records (Mapped to Database) ---

/// User
///
/// A row of the `users` table. Never serialized: the password hash must not leave
/// the store, so responses use the `Identity` projection instead.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// NewUser
///
/// Insert payload for the credential store. The hash is computed by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Identity
///
/// The minimal projection of a user that is safe to return to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Identity {
    #[ts(type = "number")]
    pub id: i64,
    pub email: String,
    pub role: Role,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Identity {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Note
///
/// A full row of the `notes` table, returned by the single-note fetch and the admin
/// mutation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Note {
    #[ts(type = "number")]
    pub id: i64,
    pub title: String,
    pub category: String,
    /// Rich-text (HTML) body, stored and returned verbatim.
    pub content: String,
    #[ts(type = "number | null")]
    pub author_id: Option<i64>,
    #[ts(type = "number")]
    pub views: i64,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// NoteSummary
///
/// The listing projection: everything except the body and authorship.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct NoteSummary {
    #[ts(type = "number")]
    pub id: i64,
    pub title: String,
    pub category: String,
    #[ts(type = "number")]
    pub views: i64,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CategoryCount
///
/// Raw aggregation row: a distinct category key and its published-note count.
#[derive(Debug, Clone, FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub note_count: i64,
}

// --- Request Payloads (Input Schemas) ---
//
// Required string fields default to empty so a missing field surfaces as a 400
// validation error from the handler rather than a body rejection.

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// RegisterRequest
///
/// Self-service sign-up. The role is not accepted from the client: every registered
/// account is a plain `user`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// CreateNoteRequest
///
/// Input payload for POST /api/note. The author is never read from here; it comes
/// from the caller's token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

/// UpdateNoteRequest
///
/// Partial update payload for PUT /api/note/{id}. Absent fields keep their stored
/// values.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateNoteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

// --- Responses (Output Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: Identity,
}

/// MessageResponse
///
/// Acknowledgement body for operations without a resource to return
/// (logout, password change, delete).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        MessageResponse {
            success: true,
            message: message.into(),
        }
    }
}

/// AdminStats
///
/// Output schema for GET /api/admin_stats.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AdminStats {
    #[ts(type = "number")]
    pub total_notes: i64,
    #[ts(type = "number")]
    pub total_users: i64,
    /// Sum of every note's counter; zero (never null) on an empty store.
    #[ts(type = "number")]
    pub total_views: i64,
    /// Latest `updated_at` across notes, null when there are none.
    #[ts(type = "string | null")]
    pub last_update: Option<DateTime<Utc>>,
}
