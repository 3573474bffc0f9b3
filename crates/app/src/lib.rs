//! # hkmiio-app
//!
//! Application layer — **port definitions** (traits) and the adapter
//! lifecycle that bridges miIO devices to accessories.
//!
//! ## Responsibilities
//! - Define **port traits** for the two external collaborators:
//!   - `DeviceClient` / `DeviceHandle` — device discovery, subscription, control
//!   - `AccessoryTransport` / `AccessoryServer` — accessory presentation server
//! - Hold each accessory's characteristic values behind one lock, with the
//!   silent-set (device-driven) and remote-update (controller-driven) paths
//!   kept as distinct operations
//! - Provide per-kind **translation profiles** between inbound events,
//!   characteristics and outbound commands
//! - Run one `Adapter` per device and keep them in the `Coordinator` registry
//! - Drive the coordinator from the device discovery stream
//!
//! ## Dependency rule
//! Depends on `hkmiio-domain` only (plus `tokio` for tasks and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod accessory;
pub mod adapter;
pub mod coordinator;
pub mod discovery;
pub mod ports;
pub mod profile;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;
