//! Webhook-driven cascade merge bot for Bitbucket Cloud.
//!
//! Listens for merged-pull-request events and forwards each merge
//! through every newer release branch and the integration branch,
//! opening a fallback pull request where a step cannot be auto-merged.

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use secrecy::ExposeSecret;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use cascade_bitbucket::BitbucketClient;

mod routes;
mod settings;
mod worker;

use settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let api = BitbucketClient::new(&settings.username, settings.password.expose_secret())
        .context("failed to build the bitbucket client")?;

    // bounded queue so merges run one at a time while bursts get 429
    let (events, queue) = mpsc::channel(settings.queue_capacity);
    let worker = tokio::spawn(worker::run(queue, api, settings.clone()));

    let state = routes::AppState {
        events,
        token: settings.token().map(String::from),
    };

    let address = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("cannot start server on {address}"))?;
    tracing::info!(%address, "listening for pull request events");

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // serve dropped the last sender; the worker drains and exits
    worker.await.context("worker task panicked")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}
