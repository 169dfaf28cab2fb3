// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Appserver - Application Container Server
//!
//! Deploys the applications listed in `APPSERVER_APPLICATIONS` into one
//! container, runs them until Ctrl-C and stops them gracefully.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use appserver_core::config::Config;
use appserver_core::factory::ComponentRegistry;
use appserver_core::runtime::AppServerRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "appserver=info,appserver_core=info,appserver_naming=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Load configuration
    let config = Config::from_env()?;
    let applications = config.load_applications()?;

    info!(
        container = %config.container.name,
        runlevel = %config.container.runlevel,
        app_base = %config.container.app_base.display(),
        applications = applications.len(),
        "Starting appserver"
    );

    // Application workers are OS threads; keep them off the async executor.
    let runtime = tokio::task::spawn_blocking(move || {
        AppServerRuntime::builder()
            .container(config.container)
            .applications(applications)
            .component_registry(Arc::new(ComponentRegistry::with_defaults()))
            .application_tick(config.application_tick)
            .build()?
            .start()
    })
    .await??;

    let runtime = tokio::task::spawn_blocking(move || {
        if !runtime.wait_until_connected(Duration::from_secs(30)) {
            warn!("Not every application connected");
        }
        runtime
    })
    .await?;

    info!(
        container = %runtime.container().settings().name,
        "Appserver ready"
    );

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Graceful shutdown
    tokio::task::spawn_blocking(move || runtime.shutdown()).await??;

    info!("Appserver shut down");

    Ok(())
}
