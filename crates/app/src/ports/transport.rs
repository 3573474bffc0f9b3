//! Presentation transport port — serves an accessory to controllers.

use std::future::Future;
use std::sync::Arc;

use hkmiio_domain::accessory::AccessoryDescriptor;
use hkmiio_domain::error::BridgeError;

use crate::accessory::Accessory;

/// Starts accessory servers.
///
/// The transport owns pairing persistence (under the descriptor's storage
/// path) and the network-facing server. It reads device-originated changes
/// from [`Accessory::subscribe_changes`] and delivers controller writes
/// through [`Accessory::remote_update`].
pub trait AccessoryTransport: Send + Sync + 'static {
    /// Handle to a running server.
    type Server: AccessoryServer;

    /// Start serving `accessory`. Resolves once the server is listening.
    ///
    /// Implementations return [`BridgeError::TransportStart`] on failure.
    fn start(
        &self,
        descriptor: AccessoryDescriptor,
        accessory: Arc<Accessory>,
    ) -> impl Future<Output = Result<Self::Server, BridgeError>> + Send;
}

/// A running accessory server.
pub trait AccessoryServer: Send + Sync + 'static {
    /// Stop serving. Resolves once the server is fully torn down.
    fn stop(self) -> impl Future<Output = Result<(), BridgeError>> + Send;
}
