//! Virtual accessory transport — serves accessories in-process.
//!
//! Each started accessory gets a serve task that forwards device-originated
//! changes to "controllers": the change is logged as a JSON payload and
//! recorded so callers can inspect what a controller would have seen.
//! [`VirtualTransport::write`] plays the controller in the other direction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use hkmiio_app::accessory::{Accessory, CharacteristicChange};
use hkmiio_app::ports::{AccessoryServer, AccessoryTransport};
use hkmiio_domain::accessory::AccessoryDescriptor;
use hkmiio_domain::characteristic::{Characteristic, CharacteristicValue};
use hkmiio_domain::error::{BridgeError, CharacteristicError};
use hkmiio_domain::id::DeviceId;

#[derive(Default)]
struct TransportState {
    served: Mutex<HashMap<DeviceId, Arc<Accessory>>>,
    notifications: Mutex<HashMap<DeviceId, Vec<CharacteristicChange>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

/// In-process accessory transport. Cloning yields another handle to the
/// same set of served accessories.
#[derive(Clone, Default)]
pub struct VirtualTransport {
    state: Arc<TransportState>,
}

impl VirtualTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a controller writing `value` to a characteristic.
    ///
    /// Returns `Ok(false)` when no accessory is served for `device_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CharacteristicError`] if the accessory rejects the write.
    pub fn write(
        &self,
        device_id: DeviceId,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> Result<bool, CharacteristicError> {
        let Some(accessory) = self.accessory(device_id) else {
            return Ok(false);
        };
        tracing::debug!(%device_id, ?characteristic, %value, "controller write");
        accessory.remote_update(characteristic, value)?;
        Ok(true)
    }

    /// The accessory currently served for a device.
    #[must_use]
    pub fn accessory(&self, device_id: DeviceId) -> Option<Arc<Accessory>> {
        lock(&self.state.served).get(&device_id).cloned()
    }

    /// Ids of every accessory currently served, ascending.
    #[must_use]
    pub fn served(&self) -> Vec<DeviceId> {
        let mut ids: Vec<_> = lock(&self.state.served).keys().copied().collect();
        ids.sort();
        ids
    }

    /// Device-originated changes delivered to controllers of one accessory,
    /// oldest first. Survives the accessory being stopped.
    #[must_use]
    pub fn notifications(&self, device_id: DeviceId) -> Vec<CharacteristicChange> {
        lock(&self.state.notifications)
            .get(&device_id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn starts(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn stops(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }
}

impl AccessoryTransport for VirtualTransport {
    type Server = VirtualServer;

    async fn start(
        &self,
        descriptor: AccessoryDescriptor,
        accessory: Arc<Accessory>,
    ) -> Result<VirtualServer, BridgeError> {
        let device_id = descriptor.device_id;
        if descriptor.pairing_secret.is_empty() {
            return Err(BridgeError::TransportStart {
                device_id,
                source: "pairing secret is empty".into(),
            });
        }

        {
            let mut served = lock(&self.state.served);
            if served.contains_key(&device_id) {
                return Err(BridgeError::TransportStart {
                    device_id,
                    source: "accessory is already being served".into(),
                });
            }
            served.insert(device_id, Arc::clone(&accessory));
        }

        let changes = BroadcastStream::new(accessory.subscribe_changes());
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(serve(
            device_id,
            changes,
            shutdown_rx,
            Arc::clone(&self.state),
        ));

        self.state.starts.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            %device_id,
            name = %descriptor.info.name,
            model = %descriptor.info.model,
            storage_path = %descriptor.storage_path.display(),
            "accessory served",
        );
        Ok(VirtualServer {
            device_id,
            shutdown,
            task,
            state: Arc::clone(&self.state),
        })
    }
}

/// Handle to one served accessory.
pub struct VirtualServer {
    device_id: DeviceId,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    state: Arc<TransportState>,
}

impl AccessoryServer for VirtualServer {
    async fn stop(self) -> Result<(), BridgeError> {
        let device_id = self.device_id;
        // the serve task may already have ended with its change feed
        let _ = self.shutdown.send(());
        let joined = self.task.await;

        lock(&self.state.served).remove(&device_id);
        self.state.stops.fetch_add(1, Ordering::SeqCst);

        joined.map_err(|err| BridgeError::TransportStop {
            device_id,
            source: Box::new(err),
        })?;
        tracing::info!(%device_id, "accessory no longer served");
        Ok(())
    }
}

async fn serve(
    device_id: DeviceId,
    mut changes: BroadcastStream<CharacteristicChange>,
    mut shutdown: oneshot::Receiver<()>,
    state: Arc<TransportState>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            next = changes.next() => match next {
                Some(Ok(change)) => {
                    let payload = serde_json::json!({
                        "device_id": change.device_id,
                        "characteristic": change.characteristic,
                        "value": change.value,
                    });
                    tracing::info!(%device_id, %payload, "notifying controllers");
                    lock(&state.notifications)
                        .entry(device_id)
                        .or_default()
                        .push(change);
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    tracing::warn!(%device_id, skipped, "controller notifications lagged");
                }
                None => break,
            },
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
