//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod config;

use identity::{IdentityAppState, IdentityConfig, PgIdentityRepository, identity_router};
use platform::background::BackgroundTasks;
use platform::clock::SystemClock;
use platform::mail::{HttpMailer, LogMailer, Mailer};
use platform::metrics::HttpMetrics;
use platform::rate_limit::RateLimiterRegistry;
use platform::shutdown::{ShutdownCoordinator, shutdown_signal};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "api=info,identity=info,platform=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env()?;

    // Database connection
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let identity_config = IdentityConfig {
        environment: config.environment.clone(),
        ..IdentityConfig::default()
    };

    let repo = PgIdentityRepository::new(pool.clone(), identity_config.store_timeout);

    // Startup cleanup: remove expired tokens
    // Errors here should not prevent server startup
    if let Err(e) = repo.cleanup_expired().await {
        tracing::warn!(
            error = %e,
            "Expired token cleanup failed, continuing anyway"
        );
    }

    let mailer = match &config.mail_relay_url {
        Some(url) if config.relays_mail() => {
            tracing::info!(relay = %url, "Mail relay configured");
            Mailer::Http(HttpMailer::new(url.clone(), config.mail_sender.clone()))
        }
        _ => {
            tracing::warn!(
                environment = %config.environment,
                "No mail relay in use, verification mail is only logged"
            );
            Mailer::Log(LogMailer)
        }
    };

    let metrics = HttpMetrics::new(&identity_config.version)?;

    let tasks = BackgroundTasks::new();
    let coordinator = ShutdownCoordinator::new(config.shutdown_grace, tasks.clone());

    let limiter = Arc::new(RateLimiterRegistry::new(config.limiter.clone()));
    if limiter.config().enabled {
        limiter.clone().spawn_eviction(coordinator.token());
    }

    let state = IdentityAppState {
        repo: Arc::new(repo),
        mailer: Arc::new(mailer),
        config: Arc::new(identity_config),
        clock: Arc::new(SystemClock),
        tasks,
        limiter,
        metrics: Arc::new(metrics),
    };

    let app = identity_router(state, &config.trusted_origins);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(environment = %config.environment, "Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    coordinator.serve(listener, app, shutdown_signal()).await?;

    tracing::info!("Server stopped");

    Ok(())
}
