use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eciple_site::api::rate_limit;
use eciple_site::cli::{run_command, Cli};
use eciple_site::config::Config;
use eciple_site::engine::spawn_session_sweep;
use eciple_site::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.command.is_some() {
        init_tracing(cli.log_level.as_deref().unwrap_or("warn"));
        return run_command(&cli).await;
    }

    // Load configuration
    let config = Config::load(&cli.config)?;

    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_tracing(&log_level);

    tracing::info!("Starting eciple-site v{}", env!("CARGO_PKG_VERSION"));

    let store = eciple_site::db::open_store(&config).await?;
    let state = Arc::new(AppState::new(config.clone(), store.clone()));

    // Ensure the configured admin user exists
    if let (Some(username), Some(password)) = (
        config.auth.admin_username.as_deref(),
        config.auth.admin_password.as_deref(),
    ) {
        let created = state
            .auth
            .ensure_admin_user(username, password, config.auth.admin_email.as_deref())
            .await
            .context("Failed to bootstrap admin user")?;
        if created {
            tracing::info!(username = %username, "Bootstrapped admin user from configuration");
        }
    }

    let shutdown = CancellationToken::new();
    let sweep = spawn_session_sweep(
        store,
        Duration::from_secs(config.auth.sweep_interval_seconds),
        shutdown.clone(),
    );
    let limiter_cleanup = rate_limit::spawn_cleanup_task(
        state.rate_limiter.clone(),
        config.rate_limit.cleanup_interval,
        shutdown.clone(),
    );

    let app = eciple_site::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown.cancel();
    for (name, handle) in [("session sweep", sweep), ("rate limiter cleanup", limiter_cleanup)] {
        if let Err(e) = handle.await {
            tracing::warn!(task = name, error = %e, "Background task ended abnormally");
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
