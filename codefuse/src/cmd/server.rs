use crate::modules::{
    config,
    handlers::{contests, fallback, health, normalized_contests, preflight},
};
use anyhow::{Context, Result};
use axum::{extract::Extension, routing, Router, Server};
use clap::Args;
use codefuse_libs::Aggregator;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::CorsLayer;

#[derive(Debug, Args)]
pub struct ServerArgs {
    /// Port to listen on. Overrides the PORT environment variable.
    #[arg(long)]
    port: Option<u16>,
}

pub async fn run(args: ServerArgs) -> Result<()> {
    let config = config::load_aggregator_config()?;
    let aggregator = Aggregator::new(&config).with_context(|| {
        let message = "couldn't create http clients for contest sources";
        tracing::error!(message);
        message
    })?;

    let app = create_router(Arc::new(aggregator));
    let port = args.port.unwrap_or_else(config::port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server start at port {}", port);
    Server::try_bind(&addr)
        .with_context(|| {
            let message = format!("failed to bind server at port {}", port);
            tracing::error!(message);
            message
        })?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;

    Ok(())
}

pub fn create_router(aggregator: Arc<Aggregator>) -> Router {
    Router::new()
        .route("/api/health", routing::get(health).options(preflight))
        .route("/api/contests", routing::get(contests).options(preflight))
        .route(
            "/api/contests/normalized",
            routing::get(normalized_contests).options(preflight),
        )
        .fallback(fallback)
        .layer(Extension(aggregator))
        .layer(CorsLayer::permissive())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("failed to install signal handler: {}", e);
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

    tracing::info!("shutdown signal received, starting graceful shutdown.");
}
