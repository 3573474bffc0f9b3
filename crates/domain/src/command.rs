//! Outbound command — a control action sent to a device.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::PowerState;

/// A control action issued to a device in response to a controller write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundCommand {
    /// Switch the device on or off.
    SetPower { state: PowerState },
    /// Set the brightness percentage.
    SetBrightness { level: u8 },
    /// Set colour as hue (degrees) and saturation (percent).
    SetHsv { hue: u16, saturation: u8 },
}

impl fmt::Display for OutboundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetPower { state } => write!(f, "set_power({state})"),
            Self::SetBrightness { level } => write!(f, "set_brightness({level})"),
            Self::SetHsv { hue, saturation } => write!(f, "set_hsv({hue}, {saturation})"),
        }
    }
}
