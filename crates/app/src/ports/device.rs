//! Device protocol port — discovery, subscription and control of devices.
//!
//! The device protocol client is an external collaborator: the bridge does
//! not speak miIO itself. An implementation announces devices as they
//! appear and expire, and hands out one [`DeviceHandle`] per device.

use std::future::Future;

use tokio::sync::mpsc;

use hkmiio_domain::command::OutboundCommand;
use hkmiio_domain::device::DeviceKind;
use hkmiio_domain::error::BridgeError;
use hkmiio_domain::event::InboundEvent;
use hkmiio_domain::id::DeviceId;

/// A discovery notification from the device protocol.
#[derive(Debug)]
pub enum Announcement<D> {
    /// A device became reachable.
    Appeared(D),
    /// A device stopped responding and should be torn down.
    Expired(DeviceId),
}

/// Entry point of the device protocol client.
pub trait DeviceClient: Send + Sync + 'static {
    /// Handle type for individual devices.
    type Device: DeviceHandle;

    /// Open the stream of appearance/expiry notifications.
    ///
    /// The stream ends when the client shuts down.
    fn discover(
        &self,
    ) -> impl Future<Output = Result<mpsc::Receiver<Announcement<Self::Device>>, BridgeError>> + Send;
}

/// A single device reachable through the device protocol.
pub trait DeviceHandle: Send + Sync + 'static {
    /// Protocol-assigned identifier.
    fn id(&self) -> DeviceId;

    /// What kind of device this is; selects the translation profile.
    fn kind(&self) -> DeviceKind;

    /// Open a subscription to this device's state changes.
    ///
    /// Implementations return [`BridgeError::Subscription`] on failure.
    fn subscribe(&self) -> impl Future<Output = Result<Subscription, BridgeError>> + Send;

    /// Execute a control command (`set_power`, `set_brightness`, `set_hsv`).
    ///
    /// Implementations return [`BridgeError::Command`] on failure.
    fn execute(
        &self,
        command: OutboundCommand,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;
}

/// Receiving end of a device subscription.
///
/// Events arrive in the order the device reported them. Closing (or
/// dropping) the subscription makes further sends on the device side fail,
/// which is how the device protocol learns the subscriber went away.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<InboundEvent>,
}

impl Subscription {
    /// Wrap the receiving half of an event channel.
    #[must_use]
    pub fn new(events: mpsc::Receiver<InboundEvent>) -> Self {
        Self { events }
    }

    /// Create a bounded subscription channel, returning the device-side sender.
    #[must_use]
    pub fn channel(capacity: usize) -> (mpsc::Sender<InboundEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }

    /// Wait for the next event. Returns `None` once the device side hung up
    /// or the subscription was closed and drained.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.events.recv().await
    }

    /// Close the subscription. Buffered events are discarded.
    pub fn close(&mut self) {
        self.events.close();
        while self.events.try_recv().is_ok() {}
    }
}
