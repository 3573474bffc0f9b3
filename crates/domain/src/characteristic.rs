//! Characteristic — a typed accessory property visible to controllers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The accessory characteristics the bridge exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Characteristic {
    On,
    Brightness,
    Hue,
    Saturation,
}

/// Value type a characteristic carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    Bool,
    Int,
    Float,
}

impl Characteristic {
    /// The value format controllers read and write for this characteristic.
    #[must_use]
    pub fn format(self) -> ValueFormat {
        match self {
            Self::On => ValueFormat::Bool,
            Self::Brightness => ValueFormat::Int,
            Self::Hue | Self::Saturation => ValueFormat::Float,
        }
    }

    /// Value a freshly built accessory starts with.
    #[must_use]
    pub fn default_value(self) -> CharacteristicValue {
        match self {
            Self::On => CharacteristicValue::Bool(false),
            Self::Brightness => CharacteristicValue::Int(100),
            Self::Hue | Self::Saturation => CharacteristicValue::Float(0.0),
        }
    }

    /// Inclusive numeric bounds, `None` for booleans.
    #[must_use]
    pub fn bounds(self) -> Option<(f64, f64)> {
        match self {
            Self::On => None,
            Self::Brightness | Self::Saturation => Some((0.0, 100.0)),
            Self::Hue => Some((0.0, 360.0)),
        }
    }

    /// Whether `value` has the right type and lies within bounds.
    #[must_use]
    pub fn accepts(self, value: &CharacteristicValue) -> bool {
        let format_ok = matches!(
            (self.format(), value),
            (ValueFormat::Bool, CharacteristicValue::Bool(_))
                | (ValueFormat::Int, CharacteristicValue::Int(_))
                | (ValueFormat::Float, CharacteristicValue::Float(_) | CharacteristicValue::Int(_))
        );
        if !format_ok {
            return false;
        }
        match (self.bounds(), value.as_f64()) {
            (Some((min, max)), Some(v)) => (min..=max).contains(&v),
            _ => true,
        }
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Brightness => f.write_str("brightness"),
            Self::Hue => f.write_str("hue"),
            Self::Saturation => f.write_str("saturation"),
        }
    }
}

/// Current value of a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl CharacteristicValue {
    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to floats.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Self::Bool(_) => None,
            Self::Int(i) => Some(i as f64),
            Self::Float(f) => Some(f),
        }
    }
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => b.fmt(f),
            Self::Int(i) => i.fmt(f),
            Self::Float(v) => v.fmt(f),
        }
    }
}
