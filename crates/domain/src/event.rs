//! Inbound event — a state change reported by a device subscription.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::PowerState;

/// A state change pushed by a device over its subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// The device switched on or off.
    PowerChanged { state: PowerState },
    /// A colour bulb changed its colour or brightness.
    LightChanged {
        /// Hue in degrees, `0..=359`.
        hue: u16,
        /// Brightness percentage, `0..=100`.
        brightness: u8,
        /// Saturation percentage, `0..=100`.
        saturation: u8,
    },
}

impl InboundEvent {
    /// Short variant name used in log lines.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PowerChanged { .. } => "power_changed",
            Self::LightChanged { .. } => "light_changed",
        }
    }
}

impl fmt::Display for InboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PowerChanged { state } => write!(f, "power_changed({state})"),
            Self::LightChanged {
                hue,
                brightness,
                saturation,
            } => write!(f, "light_changed(h={hue}, b={brightness}, s={saturation})"),
        }
    }
}
