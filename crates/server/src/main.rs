//! Pinboard server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use pinboard_core::config::AppConfig;
use pinboard_server::{AppState, create_router};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pinboard - a social networking backend
#[derive(Parser, Debug)]
#[command(name = "pinboardd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "PINBOARD_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Pinboard v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    // PINBOARD_CONFIG is just the file path, not configuration itself.
    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("PINBOARD_") && key != "PINBOARD_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: pinboardd --config /path/to/config.toml\n  \
             2. Environment variables: PINBOARD_SERVER__BIND=0.0.0.0:8080 \
             PINBOARD_IDENTITY__JWT_SECRET=YOUR_SECRET_HERE pinboardd\n\n\
             See config/server.example.toml for example configuration.\n\
             Set PINBOARD_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("PINBOARD_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Register Prometheus metrics
    pinboard_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    // Initialize media store
    let media = pinboard_media::from_config(&config.media)
        .await
        .context("failed to initialize media store")?;
    tracing::info!(backend = media.backend_name(), "Media store initialized");

    // Verify media connectivity before accepting requests. Catches
    // misconfigured buckets and unwritable directories early.
    media
        .health_check()
        .await
        .context("media store health check failed")?;
    tracing::info!("Media store connectivity verified");

    // Initialize ledger store (runs migrations on startup)
    let ledger = pinboard_ledger::from_config(&config.ledger)
        .await
        .context("failed to initialize ledger store")?;
    ledger
        .health_check()
        .await
        .context("ledger health check failed")?;
    tracing::info!("Ledger store initialized");

    // Create application state
    let state = AppState::new(config.clone(), ledger, media);

    // Spawn rate limiter cleanup task if rate limiting is enabled
    if let Some(cleanup_interval) = state.rate_limit_cleanup_interval() {
        let rate_limit_state = state.rate_limit.clone();
        pinboard_server::ratelimit::spawn_cleanup_task(rate_limit_state, cleanup_interval);
        tracing::info!(
            interval_secs = cleanup_interval.as_secs(),
            "Rate limiter cleanup task spawned"
        );
    }

    // Spawn the keep-alive pinger if configured
    if let Some(keepalive) = &config.keepalive {
        keepalive
            .validate()
            .map_err(|e| anyhow::anyhow!(e))
            .context("invalid keepalive configuration")?;
        pinboard_server::keepalive::spawn_keepalive_task(keepalive.clone());
        tracing::info!(
            url = %keepalive.url,
            interval_secs = keepalive.interval_secs,
            "Keep-alive pinger spawned"
        );
    }

    // Create router
    let app = create_router(state);

    // Parse bind address
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    tracing::info!("Listening on {}", addr);

    // Start server with ConnectInfo for client IP extraction
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
