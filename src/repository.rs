use crate::error::Result;
use crate::models::{
    AdminStats, CategoryCount, NewUser, Note, NoteSummary, UpdateNoteRequest, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    FromRow, QueryBuilder, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc};
use uuid::Uuid;

/// NewNote
///
/// Validated insert payload. The author comes from the caller's identity.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub title: String,
    pub category: String,
    pub content: String,
    pub is_published: bool,
    pub author_id: Option<i64>,
}

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers talk to
/// `Arc<dyn Repository>` only, so tests can substitute an in-memory pool or a mock.
///
/// Every method is a single statement (or, for seeding, a single transaction) and
/// propagates store failures as `AppError::Storage`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credential Store ---
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn create_user(&self, user: NewUser) -> Result<User>;
    // Returns false when the user does not exist.
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool>;

    // --- Token revocation ---
    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<()>;
    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool>;

    // --- First boot ---
    // Inserts the admin and the given notes unless the email already exists.
    // Returns true when anything was written.
    async fn seed_admin(&self, admin: NewUser, notes: Vec<NewNote>) -> Result<bool>;

    // --- Public note reads (published only) ---
    async fn list_notes(
        &self,
        category: Option<String>,
        search: Option<String>,
    ) -> Result<Vec<NoteSummary>>;
    // Increments the counter and returns the post-increment row in one statement.
    async fn view_note(&self, id: i64) -> Result<Option<Note>>;
    async fn category_counts(&self) -> Result<Vec<CategoryCount>>;

    // --- Admin ---
    async fn list_all_notes(&self) -> Result<Vec<Note>>;
    async fn distinct_categories(&self) -> Result<Vec<String>>;
    async fn create_note(&self, note: NewNote) -> Result<Note>;
    async fn update_note(&self, id: i64, req: UpdateNoteRequest) -> Result<Option<Note>>;
    async fn delete_note(&self, id: i64) -> Result<bool>;
    async fn get_stats(&self) -> Result<AdminStats>;
    async fn top_notes(&self, limit: i64) -> Result<Vec<NoteSummary>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const NOTE_COLUMNS: &str =
    "id, title, category, content, author_id, views, is_published, created_at, updated_at";
const SUMMARY_COLUMNS: &str = "id, title, category, views, updated_at";
const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, is_active, created_at, updated_at";

/// connect
///
/// Opens the SQLite pool and applies the embedded migrations. In-memory databases
/// are per-connection, so they get a single connection that is never recycled.
pub async fn connect(db_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = if db_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(sqlx::Error::from)?;

    Ok(pool)
}

/// A listing row plus the body, which the search filter needs but the response
/// does not carry.
#[derive(FromRow)]
struct SearchRow {
    #[sqlx(flatten)]
    summary: NoteSummary,
    content: String,
}

/// SqliteRepository
///
/// The concrete implementation of the `Repository` trait, backed by SQLite.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// create_user
    ///
    /// Unique violations on email or username are returned as `Storage` errors; the
    /// registration handler maps them to a conflict.
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, role, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 1, ?, ?) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.role.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
                .bind(password_hash)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// revoke_token
    ///
    /// Records the token id until its natural expiry and prunes entries that have
    /// already expired, so the table only ever holds live revocations.
    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO revoked_tokens (jti, expires_at) VALUES (?, ?)")
            .bind(jti.to_string())
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT jti FROM revoked_tokens WHERE jti = ?")
                .bind(jti.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// seed_admin
    ///
    /// One transaction: the existence check, the admin insert and the sample notes
    /// commit together or not at all.
    async fn seed_admin(&self, admin: NewUser, notes: Vec<NewNote>) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(&admin.email)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Ok(false);
        }

        let now = Utc::now();
        let admin_id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash, role, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 1, ?, ?) RETURNING id",
        )
        .bind(admin.username)
        .bind(admin.email)
        .bind(admin.password_hash)
        .bind(admin.role.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for note in notes {
            sqlx::query(
                "INSERT INTO notes (title, category, content, author_id, views, is_published, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, 0, ?, ?, ?)",
            )
            .bind(note.title)
            .bind(note.category)
            .bind(note.content)
            .bind(note.author_id.unwrap_or(admin_id))
            .bind(note.is_published)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// list_notes
    ///
    /// Builds the filter with `QueryBuilder` so every user value is bound, never
    /// interpolated. `WHERE is_published = 1` is unconditional.
    ///
    /// SQLite's `lower()` only folds ASCII, so the search term is matched here with
    /// Unicode case folding on both sides. A plain substring test also keeps `%` and
    /// `_` literal.
    async fn list_notes(
        &self,
        category: Option<String>,
        search: Option<String>,
    ) -> Result<Vec<NoteSummary>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {SUMMARY_COLUMNS}, content FROM notes WHERE is_published = 1"
        ));

        if let Some(c) = category {
            builder.push(" AND category = ");
            builder.push_bind(c);
        }

        builder.push(" ORDER BY updated_at DESC, id DESC");

        let rows = builder
            .build_query_as::<SearchRow>()
            .fetch_all(&self.pool)
            .await?;

        let needle = search.map(|s| s.to_lowercase());
        let notes = rows
            .into_iter()
            .filter(|row| match &needle {
                Some(needle) => {
                    row.summary.title.to_lowercase().contains(needle.as_str())
                        || row.content.to_lowercase().contains(needle.as_str())
                }
                None => true,
            })
            .map(|row| row.summary)
            .collect();
        Ok(notes)
    }

    async fn view_note(&self, id: i64) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "UPDATE notes SET views = views + 1 WHERE id = ? AND is_published = 1 RETURNING {NOTE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(note)
    }

    async fn category_counts(&self) -> Result<Vec<CategoryCount>> {
        let rows = sqlx::query_as::<_, CategoryCount>(
            "SELECT category, COUNT(id) AS note_count FROM notes \
             WHERE is_published = 1 GROUP BY category ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// list_all_notes
    ///
    /// Administrative listing. Does *not* filter on `is_published`.
    async fn list_all_notes(&self) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY updated_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(notes)
    }

    async fn distinct_categories(&self) -> Result<Vec<String>> {
        let categories: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT category FROM notes ORDER BY category")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    async fn create_note(&self, note: NewNote) -> Result<Note> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, Note>(&format!(
            "INSERT INTO notes (title, category, content, author_id, views, is_published, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 0, ?, ?, ?) RETURNING {NOTE_COLUMNS}"
        ))
        .bind(note.title)
        .bind(note.category)
        .bind(note.content)
        .bind(note.author_id)
        .bind(note.is_published)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// update_note
    ///
    /// `COALESCE` keeps the stored value for every field the request leaves out.
    async fn update_note(&self, id: i64, req: UpdateNoteRequest) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "UPDATE notes \
             SET title = COALESCE(?, title), \
                 category = COALESCE(?, category), \
                 content = COALESCE(?, content), \
                 is_published = COALESCE(?, is_published), \
                 updated_at = ? \
             WHERE id = ? RETURNING {NOTE_COLUMNS}"
        ))
        .bind(req.title)
        .bind(req.category)
        .bind(req.content)
        .bind(req.is_published)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(note)
    }

    async fn delete_note(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// get_stats
    ///
    /// Compiles the dashboard counters. `COALESCE` turns the empty-table `SUM` into 0.
    async fn get_stats(&self) -> Result<AdminStats> {
        let total_notes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(&self.pool)
            .await?;
        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let total_views: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(views), 0) FROM notes")
            .fetch_one(&self.pool)
            .await?;
        let last_update: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT updated_at FROM notes ORDER BY updated_at DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(AdminStats {
            total_notes,
            total_users,
            total_views,
            last_update,
        })
    }

    /// top_notes
    ///
    /// Ranks by views; equal counts keep insertion order (`id ASC`).
    async fn top_notes(&self, limit: i64) -> Result<Vec<NoteSummary>> {
        let notes = sqlx::query_as::<_, NoteSummary>(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM notes ORDER BY views DESC, id ASC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(notes)
    }
}
