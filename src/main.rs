use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gallery_backend::{config::Config, routes::build_router, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        "Configuration loaded (backend: {:?}, rated uploads: {:?})",
        config.storage_backend,
        config.rated_upload_policy
    );

    let state = AppState::new(&config).await?;
    tracing::info!("AppState initialized");

    // One request replenished every 50ms per client IP, bursts up to 100.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(50)
            .burst_size(100)
            .use_headers()
            .finish()
            .context("Invalid rate limiter configuration")?,
    );

    let app = build_router(state).layer(GovernorLayer::new(governor_conf));

    let addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
