//! # hkmiio-adapter-virtual
//!
//! In-process stand-ins for the two external protocols, for demonstration
//! and end-to-end testing.
//!
//! ## Provided adapters
//!
//! | Adapter | Port | Behaviour |
//! |---------|------|-----------|
//! | [`VirtualDeviceClient`] | `DeviceClient` | Announces/expires simulated devices on demand |
//! | [`VirtualDevice`] | `DeviceHandle` | Applies commands to its own state and reports the result, like a real plug or bulb |
//! | [`VirtualTransport`] | `AccessoryTransport` | Logs controller notifications as JSON and lets callers play the controller |
//!
//! ## Dependency rule
//!
//! Depends on `hkmiio-app` (port traits) and `hkmiio-domain` only.

mod client;
mod device;
mod transport;

pub use client::VirtualDeviceClient;
pub use device::VirtualDevice;
pub use transport::{VirtualServer, VirtualTransport};
