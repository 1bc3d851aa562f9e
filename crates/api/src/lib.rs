// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the KernelCI API core: wires `kernelci-core`'s Node
//! Store, Event Log, Transient Bus, Subscription Registry, Delivery Engine
//! and State Machine Driver behind axum routes.

pub mod auth;
pub mod cloudevents;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use kernelci_core::driver::StateMachineDriver;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use auth::{Authenticator, BearerAuthenticator};
use config::ApiConfig;
use state::AppState;

/// Bind, wire and serve until shutdown. The state machine driver runs
/// alongside the HTTP server as a background task, not inside a request
/// handler.
///
/// Grounded on `crates/mux/src/lib.rs::run`: construct shared state, spawn
/// the background sweep loop, then `axum::serve` with a
/// `CancellationToken`-driven graceful shutdown future.
pub async fn run(config: ApiConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let authenticator: Arc<dyn Authenticator> = Arc::new(BearerAuthenticator::new(config.secret_key.clone()));
    let state = AppState::new(&config, authenticator, shutdown.clone());

    let driver = StateMachineDriver::new(
        Arc::clone(&state.store),
        Arc::clone(&state.event_log),
        config.core.driver_tick_interval(),
    );
    let driver_shutdown = shutdown.clone();
    let driver_handle = tokio::spawn(async move { driver.run(driver_shutdown).await });

    let router = routes::build_router(state);
    let listener = TcpListener::bind(config.bind_addr()).await.with_context(|| format!("binding {}", config.bind_addr()))?;
    tracing::info!(addr = %config.bind_addr(), "kernelci-api listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown_signal(shutdown.clone()))
        .await
        .context("server error")?;

    shutdown.cancel();
    driver_handle.await.context("driver task panicked")?;
    Ok(())
}

async fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate()).expect("failed to install SIGTERM handler").recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = shutdown.cancelled() => {}
    }
    tracing::info!("shutdown signal received");
    shutdown.cancel();
    // Give the driver's current tick a moment to observe cancellation before
    // axum finishes draining in-flight connections.
    tokio::time::sleep(Duration::from_millis(10)).await;
}
