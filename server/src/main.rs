//! Invite Redeem Server
//!
//! Serves the redemption and admin API on top of a shared Redis.
//!
//! # Usage
//!
//! ```bash
//! # Start Redis
//! docker run -d -p 6379:6379 redis:7-alpine
//!
//! # Run server
//! REDIS_URL=redis://127.0.0.1:6379 ADMIN_TOKEN=... \
//! INVITE_ACCOUNT_ID=... INVITE_TOKEN=... \
//! cargo run --bin invite-redeem-server
//! ```

mod config;

use anyhow::Context;
use axum::http::{Method, header};
use config::Config;
use invite_redeem::{
    AppState, HttpInviteSender, RedemptionCoordinator, RedisStoreHandle, SystemClock,
    build_router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "invite_redeem=info,invite_redeem_server=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(?config, "Configuration loaded");

    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN is not set; admin routes will answer 500");
    }
    if config.invite.credentials.is_none() {
        tracing::warn!("INVITE_ACCOUNT_ID/INVITE_TOKEN are not set; redemptions will answer 500");
    }

    let store = Arc::new(RedisStoreHandle::new(config.redis_url.clone()));
    let sender = HttpInviteSender::new(config.invite.base_url.clone(), config.invite.timeout)
        .context("Failed to build invite HTTP client")?;

    let coordinator = RedemptionCoordinator::new(
        Arc::clone(&store),
        Arc::new(sender),
        Arc::new(SystemClock),
        config.invite.credentials.clone(),
        &config.redeem,
    );
    let state = AppState::new(coordinator, store, config.admin_token.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(config.server.cors_max_age);

    let app = build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(address = %address, "Invite redeem server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
