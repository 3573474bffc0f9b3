//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `hkmiio.toml` in the working directory. Every field except the
//! pairing secret has a sensible default, so the file is optional when the
//! secret comes from `HKMIIO_PAIRING_SECRET`. Environment variables take
//! precedence over file values.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use hkmiio_app::settings::{BridgeSettings, StartFailurePolicy};
use hkmiio_domain::device::DeviceKind;
use hkmiio_domain::id::DeviceId;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Accessory bridge settings.
    pub bridge: BridgeConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Simulated devices announced at startup.
    pub virtual_devices: Vec<VirtualDeviceConfig>,
}

/// Accessory bridge configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Setup code shared by every bridged accessory (`NNN-NN-NNN`).
    pub pairing_secret: String,
    /// Parent directory of the per-device `dev-{id}` pairing storage.
    pub storage_dir: PathBuf,
    /// What to do when one device's accessory fails to start.
    pub on_start_failure: StartFailurePolicy,
    /// How long stopping an accessory may take, in milliseconds.
    pub stop_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
    /// Raise the bridge's own crates to `debug`.
    pub debug: bool,
    /// Raise the device protocol client to `debug`.
    pub protocol_debug: bool,
}

/// One simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VirtualDeviceConfig {
    pub id: DeviceId,
    pub kind: DeviceKind,
}

impl Config {
    /// Load configuration from `hkmiio.toml` (if present), apply
    /// environment-variable overrides, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("hkmiio.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HKMIIO_PAIRING_SECRET") {
            self.bridge.pairing_secret = val;
        }
        if let Ok(val) = std::env::var("HKMIIO_STORAGE_DIR") {
            self.bridge.storage_dir = PathBuf::from(val);
        }
        if let Some(flag) = env_flag("HKMIIO_DEBUG") {
            self.logging.debug = flag;
        }
        if let Some(flag) = env_flag("HKMIIO_PROTOCOL_DEBUG") {
            self.logging.protocol_debug = flag;
        }
        if let Ok(val) = std::env::var("HKMIIO_LOG") {
            self.logging.filter = val;
        }
        // RUST_LOG wins over every other logging knob
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
            self.logging.debug = false;
            self.logging.protocol_debug = false;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.pairing_secret.is_empty() {
            return Err(ConfigError::MissingPairingSecret);
        }
        if !is_pairing_code(&self.bridge.pairing_secret) {
            return Err(ConfigError::Validation(
                "pairing secret must look like 031-45-154".to_string(),
            ));
        }
        if self.bridge.stop_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "stop timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the settings handed to the coordinator.
    #[must_use]
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            pairing_secret: self.bridge.pairing_secret.clone(),
            storage_dir: self.bridge.storage_dir.clone(),
            start_failure: self.bridge.on_start_failure,
            stop_timeout: Duration::from_millis(self.bridge.stop_timeout_ms),
        }
    }

    /// Return the full `tracing` filter directive, debug flags included.
    #[must_use]
    pub fn log_directives(&self) -> String {
        let mut directives = self.logging.filter.clone();
        if self.logging.debug {
            directives.push_str(",hkmiiod=debug,hkmiio_app=debug");
        }
        if self.logging.protocol_debug {
            directives.push_str(",hkmiio_adapter_virtual=debug");
        }
        directives
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            pairing_secret: String::new(),
            storage_dir: PathBuf::from("."),
            on_start_failure: StartFailurePolicy::default(),
            stop_timeout_ms: 5_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hkmiiod=info,hkmiio_app=info,hkmiio_adapter_virtual=info".to_string(),
            debug: false,
            protocol_debug: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No pairing secret in the file or the environment.
    #[error("a pairing secret is required (bridge.pairing_secret or HKMIIO_PAIRING_SECRET)")]
    MissingPairingSecret,
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

fn env_flag(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// `NNN-NN-NNN`, digits only.
fn is_pairing_code(secret: &str) -> bool {
    let bytes = secret.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            3 | 6 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}
