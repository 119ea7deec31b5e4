//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors; request-level errors are mapped by
//! the credential crate's presentation layer.

use axum::{
    Router, http,
    http::{Method, header},
};
use credential::domain::repository::CredentialRepository;
use credential::presentation::middleware::AdminAuth;
use credential::{
    CredentialConfig, CredentialContext, FileIdentitySource, HttpPlatformClient,
    MemoryCredentialStore, PgCredentialRepository, credential_router,
};
use platform::rate_limit::RateLimitConfig;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "api=info,credential=info,platform=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;
    let admin = AdminAuth::new(env::var("ADMIN_TOKEN").ok());
    if !admin.is_enabled() {
        tracing::warn!("ADMIN_TOKEN not set, admin routes are disabled");
    }

    let platform = HttpPlatformClient::new(&config)?;
    let source = FileIdentitySource::new(config.identity_dir.clone());

    // Shared store: PostgreSQL when configured, otherwise process-local
    match env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;

            tracing::info!("Connected to database");

            // Run migrations
            sqlx::migrate!("../../../database/migrations")
                .run(&pool)
                .await?;

            tracing::info!("Migrations completed");

            let repo = PgCredentialRepository::new(pool);
            serve(CredentialContext::new(repo, platform, source, config), admin).await
        }
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, using in-memory store (state is lost on restart and not shared between instances)"
            );
            let repo = MemoryCredentialStore::new();
            serve(CredentialContext::new(repo, platform, source, config), admin).await
        }
    }
}

async fn serve<R>(
    ctx: CredentialContext<R, HttpPlatformClient, FileIdentitySource>,
    admin: AdminAuth,
) -> anyhow::Result<()>
where
    R: CredentialRepository,
{
    // Startup load: an empty pool is not fatal, identities can be added later
    match ctx.credential_store().reload().await {
        Ok(summary) => {
            tracing::info!(
                identities = summary.identities,
                new_records = summary.new_records,
                "Identity pool loaded"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "Identity load failed, continuing with an empty pool");
        }
    }

    // Startup cleanup, then the periodic job
    let maintenance = ctx.maintenance();
    maintenance.run_once().await;
    let _maintenance = maintenance.spawn();

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api", credential_router(ctx, admin))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = env::var("BIND_ADDR")
        .ok()
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 31113)));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Defaults overridden by environment variables
fn load_config() -> anyhow::Result<CredentialConfig> {
    let mut config = CredentialConfig::default();

    if let Ok(dir) = env::var("IDENTITY_DIR") {
        config.identity_dir = dir.into();
    }
    if let Some(v) = env_parse::<u32>("MAX_ATTEMPTS")? {
        config.max_attempts = v;
    }
    if let Some(v) = env_parse::<u64>("BASE_DELAY_SECS")? {
        config.base_delay = Duration::from_secs(v);
    }
    if let Some(v) = env_parse::<u32>("HOURLY_USAGE_CAP")? {
        config.hourly_usage_cap = v;
    }

    let max_requests = env_parse::<u32>("RATE_LIMIT_MAX_REQUESTS")?
        .unwrap_or(config.client_rate_limit.max_requests);
    let window_secs = env_parse::<u64>("RATE_LIMIT_WINDOW_SECS")?
        .unwrap_or(config.client_rate_limit.window.as_secs());
    config.client_rate_limit = RateLimitConfig::new(max_requests, window_secs);

    if let Ok(url) = env::var("PLATFORM_BASE_URL") {
        config.platform_base_url = url;
    }

    tracing::info!(
        identity_dir = %config.identity_dir.display(),
        max_attempts = config.max_attempts,
        hourly_usage_cap = config.hourly_usage_cap,
        rate_limit_max = config.client_rate_limit.max_requests,
        rate_limit_window_secs = config.client_rate_limit.window.as_secs(),
        "Configuration loaded"
    );

    Ok(config)
}

fn env_parse<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid {name}: {e}")),
        Err(_) => Ok(None),
    }
}
