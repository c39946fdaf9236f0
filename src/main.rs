use clinical_roots::{
    AppState, CategoryMap,
    config::{AppConfig, Env},
    create_router,
    repository::{self, RepositoryState, SqliteRepository},
    seed,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initialises logging, opens and migrates the database,
/// seeds the admin account and serves the HTTP API.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clinical_roots=debug,tower_http=info".into());

    // Pretty output for humans locally, JSON for log aggregation in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    let pool = repository::connect(&config.db_url)
        .await
        .expect("FATAL: Failed to open SQLite database. Check DATABASE_URL.");
    let repo = Arc::new(SqliteRepository::new(pool)) as RepositoryState;

    seed::seed(repo.as_ref(), &config)
        .await
        .expect("FATAL: Failed to seed the admin account.");

    let categories = match &config.category_map_path {
        Some(path) => {
            let map = CategoryMap::from_json_file(path)
                .expect("FATAL: Failed to load CATEGORY_MAP_PATH.");
            tracing::info!(path = %path, rules = map.rules().len(), "loaded category map");
            map
        }
        None => CategoryMap::default(),
    };

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        config,
        categories: Arc::new(categories),
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
    }
}
