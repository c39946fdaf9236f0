use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// pulled into handlers and extractors via `FromRef`.
#[derive(Clone)]
pub struct AppConfig {
    // SQLite connection string.
    pub db_url: String,
    // Address the HTTP server binds to.
    pub bind_addr: String,
    // Runtime environment marker. Controls log format and secret fallbacks.
    pub env: Env,
    // HMAC secret used to sign and verify bearer tokens.
    pub jwt_secret: String,
    // Fixed token lifetime. Tokens are never renewed on activity.
    pub token_ttl_hours: i64,
    // The distinguished admin account created on first boot.
    pub seed_admin_email: String,
    pub seed_admin_password: String,
    // Whether first boot also inserts the sample notes.
    pub seed_sample_notes: bool,
    // Optional JSON file replacing the built-in category mapping table.
    pub category_map_path: Option<String>,
}

/// Env
///
/// Defines the runtime context: developer-friendly defaults locally, mandatory
/// secrets in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_JWT_SECRET: &str = "local-development-secret-change-me";
const LOCAL_ADMIN_EMAIL: &str = "admin@clinicalroots.local";
const LOCAL_ADMIN_PASSWORD: &str = "change-me-locally";

impl Default for AppConfig {
    /// default
    ///
    /// A safe, non-panicking configuration for tests: in-memory database, fixed
    /// signing secret, sample notes disabled.
    fn default() -> Self {
        Self {
            db_url: "sqlite::memory:".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            env: Env::Local,
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            token_ttl_hours: 24,
            seed_admin_email: LOCAL_ADMIN_EMAIL.to_string(),
            seed_admin_password: LOCAL_ADMIN_PASSWORD.to_string(),
            seed_sample_notes: false,
            category_map_path: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment, failing fast on anything a
    /// production deployment must set explicitly.
    ///
    /// # Panics
    /// Panics in production when `JWT_SECRET`, `DATABASE_URL`, `SEED_ADMIN_EMAIL` or
    /// `SEED_ADMIN_PASSWORD` is missing, and in any environment when
    /// `TOKEN_TTL_HOURS` is not a positive integer.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let token_ttl_hours = match env::var("TOKEN_TTL_HOURS") {
            Ok(raw) => match raw.parse::<i64>() {
                Ok(hours) if hours > 0 => hours,
                _ => panic!("FATAL: TOKEN_TTL_HOURS must be a positive integer, got '{raw}'"),
            },
            Err(_) => 24,
        };

        let seed_sample_notes = env::var("SEED_SAMPLE_NOTES")
            .map(|v| !matches!(v.as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let category_map_path = env::var("CATEGORY_MAP_PATH").ok();

        match env {
            Env::Local => Self {
                env: Env::Local,
                db_url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://clinicalroots.db?mode=rwc".to_string()),
                bind_addr,
                jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                token_ttl_hours,
                seed_admin_email: env::var("SEED_ADMIN_EMAIL")
                    .unwrap_or_else(|_| LOCAL_ADMIN_EMAIL.to_string()),
                seed_admin_password: env::var("SEED_ADMIN_PASSWORD")
                    .unwrap_or_else(|_| LOCAL_ADMIN_PASSWORD.to_string()),
                seed_sample_notes,
                category_map_path,
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                bind_addr,
                jwt_secret: env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
                token_ttl_hours,
                seed_admin_email: env::var("SEED_ADMIN_EMAIL")
                    .expect("FATAL: SEED_ADMIN_EMAIL required in prod"),
                seed_admin_password: env::var("SEED_ADMIN_PASSWORD")
                    .expect("FATAL: SEED_ADMIN_PASSWORD required in prod"),
                seed_sample_notes,
                category_map_path,
            },
        }
    }
}
