//! Campus authentication server.
//!
//! Serves the `/api/auth` endpoints over PostgreSQL-backed session storage,
//! or over in-process stores with `--memory`.

use std::net::SocketAddr;

use anyhow::{Context, Error};
use ca_server::{api, config::ServerConfig, logging, metrics};
use campus_auth::{AuthManager, Database};
use pico_args::Arguments;

const HELP: &str = "\
Run the campus authentication server

USAGE:
  ca_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/campus_auth]

FLAGS:
  --memory                 Use in-process stores instead of PostgreSQL (development only)
  --purge                  Delete revoked sessions past the retention window and exit
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  JWT_SECRET               Access token signing secret (>= 32 chars)
  REFRESH_SECRET           Refresh token signing secret (>= 32 chars, differs from JWT_SECRET)
  PASSWORD_PEPPER          Password hashing pepper (>= 16 chars)
  JWT_EXPIRE               Access token lifetime  [default: 15m]
  REFRESH_EXPIRE           Refresh token lifetime [default: 7d]
  REFRESH_COOKIE_NAME      Refresh cookie name    [default: refreshToken]
  REFRESH_COOKIE_PATH      Refresh cookie path    [default: /api/auth/refresh]
  APP_ENV                  'production' marks the refresh cookie Secure
  SESSION_RETENTION_DAYS   Days revoked sessions are kept past expiry [default: 5]
  METRICS_BIND             Prometheus listener address (disabled when unset)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    memory: bool,
    purge: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        memory: pargs.contains("--memory"),
        purge: pargs.contains("--purge"),
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;
    config.validate()?;

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(anyhow::Error::msg)?;
        tracing::info!("Prometheus metrics listening on {}", metrics_bind);
    }

    let auth_manager = if args.memory {
        tracing::warn!("Using in-memory stores; all sessions are lost on exit");
        AuthManager::in_memory(config.token_secrets(), config.auth_settings())?
    } else {
        tracing::info!("Connecting to database: {}", config.database.redacted_url());
        let db = Database::new(&config.database)
            .await
            .context("Failed to connect to database")?;
        db.migrate().await.context("Failed to run migrations")?;
        tracing::info!("Database connected successfully");

        AuthManager::postgres(db.pool().clone(), config.token_secrets(), config.auth_settings())?
    };

    if args.purge {
        let purged = auth_manager.purge_expired_sessions().await?;
        tracing::info!("Purged {} revoked session(s)", purged);
        return Ok(());
    }

    let state = api::AppState::new(
        auth_manager,
        config.cookie.clone(),
        config.tokens.access_expire.as_str(),
    );
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    tracing::info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
}
