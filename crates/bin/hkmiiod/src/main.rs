//! # hkmiiod — hkmiio bridge daemon
//!
//! Composition root that wires the device protocol client and the accessory
//! transport to the coordinator and runs the discovery loop.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the `tracing` subscriber
//! - Construct the device client and accessory transport (adapters)
//! - Construct the coordinator, injecting the transport via its port trait
//! - Run discovery until the stream ends, a fatal error occurs, or a
//!   shutdown signal (SIGTERM/SIGINT) arrives, then stop every accessory
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no translation logic belongs here.

mod config;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use hkmiio_adapter_virtual::{VirtualDeviceClient, VirtualTransport};
use hkmiio_app::coordinator::Coordinator;
use hkmiio_app::discovery;

use crate::config::{Config, VirtualDeviceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(config.log_directives())?)
        .with_target(true)
        .init();

    let settings = config.bridge_settings();
    tracing::info!(
        storage_dir = %settings.storage_dir.display(),
        on_start_failure = ?settings.start_failure,
        stop_timeout_ms = config.bridge.stop_timeout_ms,
        "starting hkmiiod",
    );

    let client = Arc::new(VirtualDeviceClient::new());
    let transport = VirtualTransport::new();
    let coordinator = Arc::new(Coordinator::new(transport, settings));

    let seeding = tokio::spawn(seed(Arc::clone(&client), config.virtual_devices.clone()));

    let outcome = tokio::select! {
        result = discovery::run(client.as_ref(), Arc::clone(&coordinator)) => result,
        () = shutdown_signal() => {
            tracing::info!("shutdown requested");
            Ok(())
        }
    };

    seeding.abort();
    client.close();
    coordinator.shutdown().await;

    match outcome {
        Ok(()) => {
            tracing::info!("hkmiiod stopped");
            Ok(())
        }
        Err(err) => {
            tracing::error!(%err, "bridge failed");
            Err(err.into())
        }
    }
}

/// Announce every configured virtual device.
async fn seed(client: Arc<VirtualDeviceClient>, devices: Vec<VirtualDeviceConfig>) {
    for device in devices {
        if let Err(err) = client.announce(device.id, device.kind).await {
            tracing::warn!(device_id = %device.id, %err, "could not announce virtual device");
            return;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
