//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors; failures coming from the external
//! collaborators (device protocol, presentation transport) cross the port
//! boundary as a boxed [`BoxError`] source.

use std::time::Duration;

use crate::characteristic::{Characteristic, CharacteristicValue};
use crate::command::OutboundCommand;
use crate::device::DeviceKind;
use crate::id::DeviceId;

/// Boxed error produced by an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error type for bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The device protocol refused to open a subscription.
    #[error("failed to open subscription for device {device_id}")]
    Subscription {
        device_id: DeviceId,
        #[source]
        source: BoxError,
    },

    /// The accessory server could not be started.
    #[error("failed to start accessory transport for device {device_id}")]
    TransportStart {
        device_id: DeviceId,
        #[source]
        source: BoxError,
    },

    /// The accessory server reported an error while shutting down.
    #[error("failed to stop accessory transport for device {device_id}")]
    TransportStop {
        device_id: DeviceId,
        #[source]
        source: BoxError,
    },

    /// The device rejected or failed to execute a command.
    #[error("device {device_id} failed to execute {command}")]
    Command {
        device_id: DeviceId,
        command: OutboundCommand,
        #[source]
        source: BoxError,
    },

    /// The device discovery stream could not be opened.
    #[error("device discovery failed")]
    Discovery(#[source] BoxError),

    /// Part of the adapter teardown did not finish within the allowed time.
    #[error("teardown of device {device_id} did not finish within {timeout:?}")]
    StopTimeout {
        device_id: DeviceId,
        timeout: Duration,
    },

    /// A background task of the adapter crashed.
    #[error("adapter task for device {device_id} failed")]
    TaskFailed {
        device_id: DeviceId,
        #[source]
        source: BoxError,
    },
}

/// An inbound event variant has no translation for a device kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{event} events are not supported by {kind} devices")]
pub struct UnsupportedEventError {
    pub kind: DeviceKind,
    pub event: &'static str,
}

/// Errors raised by an accessory's characteristic store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CharacteristicError {
    /// The accessory does not expose this characteristic.
    #[error("accessory has no {0} characteristic")]
    NotPresent(Characteristic),

    /// The value has the wrong type or is out of range.
    #[error("value {value} is not valid for {characteristic}")]
    InvalidValue {
        characteristic: Characteristic,
        value: CharacteristicValue,
    },
}
