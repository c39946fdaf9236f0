use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use clinical_roots::{
    AppConfig, AppError, AppState, create_router,
    auth::{self, Claims},
    models::{Identity, Role},
    repository::{self, Repository, RepositoryState, SqliteRepository},
    seed,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

// --- Test Context ---

struct AuthTestContext {
    repo: RepositoryState,
    pool: SqlitePool,
    config: AppConfig,
}

impl AuthTestContext {
    /// In-memory store with the default seeded admin and one registered user.
    async fn setup() -> (Self, Identity) {
        let pool = repository::connect("sqlite::memory:").await.unwrap();
        let repo = Arc::new(SqliteRepository::new(pool.clone())) as RepositoryState;
        let config = AppConfig::default();

        seed::seed(repo.as_ref(), &config).await.unwrap();
        let user = auth::register(
            repo.as_ref(),
            Some("reader".to_string()),
            "reader@test.com",
            "reader-pass",
        )
        .await
        .unwrap();

        (AuthTestContext { repo, pool, config }, user)
    }

    /// Deactivation has no API; operators flip the flag in the database.
    async fn deactivate(&self, user_id: i64) {
        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    fn admin_credentials(&self) -> (String, String) {
        (
            self.config.seed_admin_email.clone(),
            self.config.seed_admin_password.clone(),
        )
    }

    fn forge(&self, claims: &Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .unwrap()
    }

    fn router(&self) -> axum::Router {
        create_router(AppState::new(self.repo.clone(), self.config.clone()))
    }
}

async fn get_me(router: axum::Router, authorization: Option<&str>) -> StatusCode {
    let mut builder = Request::builder().uri("/api/me");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    router
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
        .status()
}

// --- authenticate ---

#[tokio::test]
async fn test_login_binds_token_to_user_and_role() {
    let (ctx, _) = AuthTestContext::setup().await;
    let (email, password) = ctx.admin_credentials();

    let session = auth::authenticate(ctx.repo.as_ref(), &ctx.config, &email, &password)
        .await
        .unwrap();
    assert_eq!(session.identity.role, Role::Admin);
    assert!(session.expires_at > Utc::now() + Duration::hours(23));

    let resolved = auth::resolve_identity(ctx.repo.as_ref(), &ctx.config, &session.token)
        .await
        .unwrap();
    assert_eq!(resolved.id, session.identity.id);
    assert_eq!(resolved.role, Role::Admin);
    assert_eq!(resolved.email, email);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let (ctx, user) = AuthTestContext::setup().await;

    let wrong_password =
        auth::authenticate(ctx.repo.as_ref(), &ctx.config, "reader@test.com", "nope-nope")
            .await
            .unwrap_err();
    let unknown_email =
        auth::authenticate(ctx.repo.as_ref(), &ctx.config, "ghost@test.com", "reader-pass")
            .await
            .unwrap_err();

    ctx.deactivate(user.id).await;
    let inactive =
        auth::authenticate(ctx.repo.as_ref(), &ctx.config, "reader@test.com", "reader-pass")
            .await
            .unwrap_err();

    for err in [wrong_password, unknown_email, inactive] {
        assert!(matches!(err, AppError::InvalidCredentials));
    }
}

// --- resolve_identity ---

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let (ctx, user) = AuthTestContext::setup().await;
    let issued = Utc::now() - Duration::hours(48);
    let token = ctx.forge(&Claims {
        sub: user.id.to_string(),
        role: Role::User,
        jti: Uuid::new_v4(),
        iat: issued.timestamp() as usize,
        exp: (issued + Duration::hours(24)).timestamp() as usize,
    });

    let err = auth::resolve_identity(ctx.repo.as_ref(), &ctx.config, &token)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated));
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let (ctx, user) = AuthTestContext::setup().await;
    let other = AppConfig {
        jwt_secret: "a-completely-different-secret".to_string(),
        ..AppConfig::default()
    };
    let session = {
        let stored = ctx.repo.get_user(user.id).await.unwrap().unwrap();
        auth::issue_token(&other, &stored).unwrap()
    };

    let err = auth::resolve_identity(ctx.repo.as_ref(), &ctx.config, &session.token)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated));
}

#[tokio::test]
async fn test_token_claiming_wrong_role_is_rejected() {
    let (ctx, user) = AuthTestContext::setup().await;
    let now = Utc::now();
    let token = ctx.forge(&Claims {
        sub: user.id.to_string(),
        role: Role::Admin,
        jti: Uuid::new_v4(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(1)).timestamp() as usize,
    });

    let err = auth::resolve_identity(ctx.repo.as_ref(), &ctx.config, &token)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated));
}

#[tokio::test]
async fn test_deactivation_invalidates_live_tokens() {
    let (ctx, user) = AuthTestContext::setup().await;
    let session = auth::authenticate(ctx.repo.as_ref(), &ctx.config, "reader@test.com", "reader-pass")
        .await
        .unwrap();

    ctx.deactivate(user.id).await;

    let err = auth::resolve_identity(ctx.repo.as_ref(), &ctx.config, &session.token)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated));
}

#[tokio::test]
async fn test_logout_revokes_only_the_presented_token() {
    let (ctx, _) = AuthTestContext::setup().await;
    let first = auth::authenticate(ctx.repo.as_ref(), &ctx.config, "reader@test.com", "reader-pass")
        .await
        .unwrap();
    let second = auth::authenticate(ctx.repo.as_ref(), &ctx.config, "reader@test.com", "reader-pass")
        .await
        .unwrap();

    let caller = auth::resolve_identity(ctx.repo.as_ref(), &ctx.config, &first.token)
        .await
        .unwrap();
    auth::logout(ctx.repo.as_ref(), &caller).await.unwrap();

    assert!(
        auth::resolve_identity(ctx.repo.as_ref(), &ctx.config, &first.token)
            .await
            .is_err()
    );
    assert!(
        auth::resolve_identity(ctx.repo.as_ref(), &ctx.config, &second.token)
            .await
            .is_ok()
    );
}

// --- require_role ---

#[tokio::test]
async fn test_require_role_is_exact_match() {
    let (ctx, _) = AuthTestContext::setup().await;
    let (email, password) = ctx.admin_credentials();
    let admin_session = auth::authenticate(ctx.repo.as_ref(), &ctx.config, &email, &password)
        .await
        .unwrap();
    let admin = auth::resolve_identity(ctx.repo.as_ref(), &ctx.config, &admin_session.token)
        .await
        .unwrap();

    assert!(auth::require_role(&admin, Role::Admin).is_ok());
    // No hierarchy: an admin does not satisfy a `user` check.
    assert!(matches!(
        auth::require_role(&admin, Role::User),
        Err(AppError::Forbidden)
    ));
}

// --- change_password ---

#[tokio::test]
async fn test_change_password_validation_order() {
    let (ctx, _) = AuthTestContext::setup().await;
    let session = auth::authenticate(ctx.repo.as_ref(), &ctx.config, "reader@test.com", "reader-pass")
        .await
        .unwrap();
    let caller = auth::resolve_identity(ctx.repo.as_ref(), &ctx.config, &session.token)
        .await
        .unwrap();

    // Mismatch wins even when the current password is wrong too.
    let err = auth::change_password(ctx.repo.as_ref(), &caller, "wrong", "abcdef", "abcdeg")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = auth::change_password(ctx.repo.as_ref(), &caller, "wrong", "abc", "abc")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = auth::change_password(ctx.repo.as_ref(), &caller, "wrong", "abcdef", "abcdef")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));
}

#[tokio::test]
async fn test_change_password_replaces_credential() {
    let (ctx, _) = AuthTestContext::setup().await;
    let session = auth::authenticate(ctx.repo.as_ref(), &ctx.config, "reader@test.com", "reader-pass")
        .await
        .unwrap();
    let caller = auth::resolve_identity(ctx.repo.as_ref(), &ctx.config, &session.token)
        .await
        .unwrap();

    auth::change_password(ctx.repo.as_ref(), &caller, "reader-pass", "fresh-pass", "fresh-pass")
        .await
        .unwrap();

    assert!(
        auth::authenticate(ctx.repo.as_ref(), &ctx.config, "reader@test.com", "reader-pass")
            .await
            .is_err()
    );
    assert!(
        auth::authenticate(ctx.repo.as_ref(), &ctx.config, "reader@test.com", "fresh-pass")
            .await
            .is_ok()
    );
}

// --- register ---

#[tokio::test]
async fn test_register_rejects_duplicates_and_bad_input() {
    let (ctx, _) = AuthTestContext::setup().await;

    let err = auth::register(ctx.repo.as_ref(), None, "reader@test.com", "another-pass")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = auth::register(ctx.repo.as_ref(), None, "not-an-email", "another-pass")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = auth::register(ctx.repo.as_ref(), None, "new@test.com", "short")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let created = auth::register(ctx.repo.as_ref(), None, "new@test.com", "long-enough")
        .await
        .unwrap();
    assert_eq!(created.role, Role::User);
}

// --- seed ---

#[tokio::test]
async fn test_seed_runs_once() {
    let (ctx, _) = AuthTestContext::setup().await;
    assert!(!seed::seed(ctx.repo.as_ref(), &ctx.config).await.unwrap());

    let stats = ctx.repo.get_stats().await.unwrap();
    assert_eq!(stats.total_users, 2);
    // Sample notes are off in the default config.
    assert_eq!(stats.total_notes, 0);
}

// --- AuthUser extractor ---

#[tokio::test]
async fn test_extractor_requires_bearer_header() {
    let (ctx, _) = AuthTestContext::setup().await;

    assert_eq!(get_me(ctx.router(), None).await, StatusCode::UNAUTHORIZED);
    assert_eq!(
        get_me(ctx.router(), Some("Basic cmVhZGVyOnBhc3M=")).await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        get_me(ctx.router(), Some("Bearer not.a.jwt")).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_extractor_accepts_valid_token() {
    let (ctx, _) = AuthTestContext::setup().await;
    let session = auth::authenticate(ctx.repo.as_ref(), &ctx.config, "reader@test.com", "reader-pass")
        .await
        .unwrap();

    let bearer = format!("Bearer {}", session.token);
    assert_eq!(get_me(ctx.router(), Some(&bearer)).await, StatusCode::OK);
}
