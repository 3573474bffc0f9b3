//! Virtual device client — announces simulated devices on demand.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use hkmiio_app::ports::{Announcement, DeviceClient};
use hkmiio_domain::device::DeviceKind;
use hkmiio_domain::error::BridgeError;
use hkmiio_domain::id::DeviceId;

use crate::device::VirtualDevice;

/// Announcements buffered before `announce` waits on the discovery loop.
const ANNOUNCEMENT_CAPACITY: usize = 32;

/// Simulated device protocol client.
///
/// Announcements made before [`DeviceClient::discover`] is called are
/// buffered. The stream ends once [`VirtualDeviceClient::close`] is called.
pub struct VirtualDeviceClient {
    sender: Mutex<Option<mpsc::Sender<Announcement<VirtualDevice>>>>,
    receiver: Mutex<Option<mpsc::Receiver<Announcement<VirtualDevice>>>>,
    devices: Mutex<HashMap<DeviceId, VirtualDevice>>,
}

impl Default for VirtualDeviceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualDeviceClient {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(ANNOUNCEMENT_CAPACITY);
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            devices: Mutex::new(HashMap::new()),
        }
    }

    /// Announce a device, creating it on first use. Re-announcing a known
    /// id returns the existing device and announces it again.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Discovery`] once the client is closed.
    pub async fn announce(&self, id: DeviceId, kind: DeviceKind) -> Result<VirtualDevice, BridgeError> {
        let device = lock(&self.devices)
            .entry(id)
            .or_insert_with(|| VirtualDevice::new(id, kind))
            .clone();
        tracing::info!(device_id = %id, %kind, "announcing virtual device");
        self.send(Announcement::Appeared(device.clone())).await?;
        Ok(device)
    }

    /// Report a device as expired and forget it.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Discovery`] once the client is closed.
    pub async fn expire(&self, id: DeviceId) -> Result<(), BridgeError> {
        lock(&self.devices).remove(&id);
        tracing::info!(device_id = %id, "expiring virtual device");
        self.send(Announcement::Expired(id)).await
    }

    /// A previously announced device.
    #[must_use]
    pub fn device(&self, id: DeviceId) -> Option<VirtualDevice> {
        lock(&self.devices).get(&id).cloned()
    }

    /// End the announcement stream.
    pub fn close(&self) {
        lock(&self.sender).take();
    }

    async fn send(&self, announcement: Announcement<VirtualDevice>) -> Result<(), BridgeError> {
        let sender = lock(&self.sender)
            .clone()
            .ok_or_else(|| BridgeError::Discovery("virtual client closed".into()))?;
        sender
            .send(announcement)
            .await
            .map_err(|_| BridgeError::Discovery("announcement stream dropped".into()))
    }
}

impl DeviceClient for VirtualDeviceClient {
    type Device = VirtualDevice;

    async fn discover(&self) -> Result<mpsc::Receiver<Announcement<VirtualDevice>>, BridgeError> {
        lock(&self.receiver)
            .take()
            .ok_or_else(|| BridgeError::Discovery("announcement stream already taken".into()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
