//! Bridge settings shared by the coordinator and its adapters.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// What the coordinator does when a device's adapter fails to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartFailurePolicy {
    /// Treat the failure as fatal; the process exits and relies on an
    /// external supervisor to restart it.
    #[default]
    Abort,
    /// Log the failure and leave the device unbridged.
    Skip,
}

/// Runtime settings for bridged accessories.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Setup code controllers use to pair with every accessory.
    pub pairing_secret: String,
    /// Parent directory of each accessory's pairing storage.
    pub storage_dir: PathBuf,
    pub start_failure: StartFailurePolicy,
    /// Upper bound on how long `Adapter::stop` waits for background tasks.
    pub stop_timeout: Duration,
}

impl BridgeSettings {
    /// Settings with the given pairing secret and defaults elsewhere.
    #[must_use]
    pub fn new(pairing_secret: impl Into<String>) -> Self {
        Self {
            pairing_secret: pairing_secret.into(),
            storage_dir: PathBuf::from("."),
            start_failure: StartFailurePolicy::Abort,
            stop_timeout: Duration::from_secs(5),
        }
    }
}
