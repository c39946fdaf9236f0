use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod categories;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod seed;

// Routing split by access level (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use categories::CategoryMap;
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use repository::{RepositoryState, SqliteRepository};

/// ApiDoc
///
/// OpenAPI document assembled from the `#[utoipa::path]` handlers and the
/// `ToSchema` models. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::logout,
        handlers::change_password, handlers::get_me, handlers::get_categories,
        handlers::get_notes, handlers::get_note, handlers::get_all_categories,
        handlers::get_admin_notes, handlers::create_note, handlers::update_note,
        handlers::delete_note, handlers::get_admin_stats, handlers::get_note_views
    ),
    components(
        schemas(
            models::Role, models::Identity, models::Note, models::NoteSummary,
            models::LoginRequest, models::LoginResponse, models::RegisterRequest,
            models::ChangePasswordRequest, models::CreateNoteRequest,
            models::UpdateNoteRequest, models::MessageResponse, models::AdminStats,
            categories::CategoryEntry, categories::MajorGroup,
        )
    ),
    tags(
        (name = "clinical-roots", description = "Clinical Roots medical notes API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container handed to every request: the repository, the
/// immutable configuration and the category mapping table.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
    pub categories: Arc<CategoryMap>,
}

impl AppState {
    /// State with the built-in category table.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            repo,
            config,
            categories: Arc::new(CategoryMap::default()),
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for Arc<CategoryMap> {
    fn from_ref(app_state: &AppState) -> Arc<CategoryMap> {
        app_state.categories.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless an `AuthUser` can be resolved from it.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_middleware
///
/// Resolves the caller and requires the admin role before the handler's body
/// and path extractors run, so a non-admin gets 403 whatever the payload.
async fn admin_middleware(auth_user: AuthUser, request: Request, next: Next) -> Result<Response> {
    auth::require_role(&auth_user, models::Role::Admin)?;
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the routing tree, the scoped auth layer and the global
/// observability stack, then binds the state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Unauthenticated callers get 401 and non-admins 403, both before any
        // extractor looks at the request.
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens one span per request carrying method, URI and the `x-request-id`, so
/// every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
