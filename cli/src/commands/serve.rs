// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `aegis-fabric serve`: host the shared in-memory graph store behind the
//! HTTP API until interrupted.

use anyhow::{Context, Result};
use clap::Args;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use aegis_fabric::domain::config::FabricConfigManifest;
use aegis_fabric::presentation::api;
use aegis_fabric::{Coordinator, EventBus, Fabric, InMemoryGraphStore};

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Override spec.server.port
    #[arg(long)]
    pub port: Option<u16>,

    /// Override spec.server.host
    #[arg(long)]
    pub bind: Option<String>,

    /// Do not start the Prometheus exporter
    #[arg(long)]
    pub no_metrics: bool,
}

pub fn load_config(config_path: Option<PathBuf>, args: &ServeArgs) -> Result<FabricConfigManifest> {
    let mut config =
        FabricConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.spec.server.port = port;
    }
    if let Some(bind) = &args.bind {
        config.spec.server.host = bind.clone();
    }
    if args.no_metrics {
        config.spec.metrics.enabled = false;
    }
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

pub async fn run(config_path: Option<PathBuf>, args: ServeArgs) -> Result<()> {
    let config = load_config(config_path, &args)?;
    info!(node = %config.metadata.name, "Fabric node starting (PID: {})", std::process::id());

    if config.spec.metrics.enabled {
        let addr: SocketAddr = format!("{}:{}", config.spec.server.host, config.spec.metrics.port)
            .parse()
            .context("Invalid metrics listen address")?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics exporter listening on {}", addr);
    }

    let store = Arc::new(InMemoryGraphStore::new());
    let event_bus = EventBus::new(config.spec.event_bus.capacity);
    let coordinator = Coordinator::new(Fabric::new(store, event_bus));
    info!(tools = coordinator.tools().names().len(), "Coordinator ready");

    let app = api::app(coordinator);
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Fabric node listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Fabric node shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fabric.yaml");
        std::fs::write(
            &path,
            "apiVersion: 100monkeys.ai/v1\nkind: FabricConfig\nmetadata:\n  name: test-node\nspec:\n  server:\n    port: 7000\n",
        )
        .unwrap();

        let args = ServeArgs {
            port: Some(7100),
            bind: Some("127.0.0.1".into()),
            no_metrics: true,
        };
        let config = load_config(Some(path), &args).unwrap();
        assert_eq!(config.metadata.name, "test-node");
        assert_eq!(config.bind_address(), "127.0.0.1:7100");
        assert!(!config.spec.metrics.enabled);
    }

    #[test]
    fn test_colliding_metrics_port_is_rejected() {
        let args = ServeArgs {
            port: Some(9091),
            ..ServeArgs::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fabric.yaml");
        FabricConfigManifest::default().to_yaml_file(&path).unwrap();
        assert!(load_config(Some(path), &args).is_err());
    }
}
