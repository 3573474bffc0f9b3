//! Accessory descriptor — everything the presentation transport needs to
//! expose one bridged device.

use std::path::PathBuf;

use serde::Serialize;

use crate::characteristic::Characteristic;
use crate::device::{DeviceKind, MANUFACTURER};
use crate::id::DeviceId;

/// Identifying metadata shown to controllers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessoryInfo {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
}

impl AccessoryInfo {
    /// Derive the metadata for a device from its kind and identifier.
    #[must_use]
    pub fn for_device(id: DeviceId, kind: DeviceKind) -> Self {
        Self {
            name: format!("{} {id}", kind.label()),
            manufacturer: MANUFACTURER.to_string(),
            model: kind.model().to_string(),
            serial_number: id.to_string(),
        }
    }
}

/// Full description of an accessory to serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessoryDescriptor {
    pub device_id: DeviceId,
    pub kind: DeviceKind,
    pub info: AccessoryInfo,
    pub characteristics: Vec<Characteristic>,
    #[serde(skip)]
    pub pairing_secret: String,
    /// Directory where the transport keeps pairing state for this accessory.
    pub storage_path: PathBuf,
}

/// Directory name holding the pairing state of one device.
#[must_use]
pub fn storage_dir_name(id: DeviceId) -> String {
    format!("dev-{id}")
}
