//! Device — a piece of miIO hardware the bridge knows how to expose.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Manufacturer reported for every bridged accessory.
pub const MANUFACTURER: &str = "MiiO";

/// The kinds of device the bridge can translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Switch-like device with a single power state (e.g. a power plug).
    Switch,
    /// Colour bulb with power, brightness, hue and saturation (e.g. a Yeelight).
    TunableLight,
}

impl DeviceKind {
    /// Human-facing label used to build accessory names.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Switch => "Power Plug",
            Self::TunableLight => "Yeelight",
        }
    }

    /// Model string reported in accessory metadata.
    #[must_use]
    pub fn model(self) -> &'static str {
        match self {
            Self::Switch => "PowerPlug",
            Self::TunableLight => "Yeelight",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch => f.write_str("switch"),
            Self::TunableLight => f.write_str("tunable_light"),
        }
    }
}

/// Power state reported by, or requested from, a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl From<bool> for PowerState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
        }
    }
}
