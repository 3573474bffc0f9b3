//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the bridge core and the two external
//! protocols. They are defined here (in `app`) so that both the adapter
//! lifecycle and the protocol adapters can depend on them without creating
//! circular dependencies.

pub mod device;
pub mod transport;

pub use device::{Announcement, DeviceClient, DeviceHandle, Subscription};
pub use transport::{AccessoryServer, AccessoryTransport};
