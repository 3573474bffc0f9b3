//! Coordinator — the registry of live adapters, keyed by device id.
//!
//! The registry map holds one slot per device id. The map itself is only
//! locked briefly to find, insert or retire a slot; each slot has its own
//! async mutex, held across the check-start-insert and stop-retire
//! sequences. At most one adapter exists per device id at any instant, and a
//! device whose start or teardown is slow never holds up the others.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex, MutexGuard, PoisonError};

use tokio::sync::Mutex;

use hkmiio_domain::error::BridgeError;
use hkmiio_domain::id::DeviceId;

use crate::accessory::Accessory;
use crate::adapter::{Adapter, AdapterSummary};
use crate::ports::{AccessoryTransport, DeviceHandle};
use crate::settings::{BridgeSettings, StartFailurePolicy};

/// Outcome of a device-appeared notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new adapter was started and registered.
    Started,
    /// The device already has an adapter; nothing changed.
    AlreadyTracked,
    /// The adapter failed to start and the policy says to carry on.
    Skipped,
}

/// Outcome of a device-expired notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The adapter was stopped and removed.
    Stopped,
    /// No adapter was registered for the device.
    NotTracked,
}

/// A device's place in the registry. Empty while its first start is pending.
type Slot<D, S> = Arc<Mutex<Option<Adapter<D, S>>>>;

/// Owns the adapter registry and drives adapter lifecycles.
pub struct Coordinator<D, T: AccessoryTransport> {
    transport: T,
    settings: BridgeSettings,
    registry: SyncMutex<HashMap<DeviceId, Slot<D, T::Server>>>,
}

impl<D, T> Coordinator<D, T>
where
    D: DeviceHandle,
    T: AccessoryTransport,
{
    /// Create a coordinator serving accessories through `transport`.
    pub fn new(transport: T, settings: BridgeSettings) -> Self {
        Self {
            transport,
            settings,
            registry: SyncMutex::new(HashMap::new()),
        }
    }

    /// Bridge a newly discovered device.
    ///
    /// Idempotent: a device that already has an adapter is left alone.
    ///
    /// # Errors
    ///
    /// Under [`StartFailurePolicy::Abort`], returns the adapter's start error
    /// ([`BridgeError::Subscription`] or [`BridgeError::TransportStart`]);
    /// the caller is expected to terminate.
    #[tracing::instrument(skip(self, device), fields(device_id = %device.id(), kind = %device.kind()))]
    pub async fn device_appeared(&self, device: D) -> Result<Registration, BridgeError> {
        let device_id = device.id();
        loop {
            let slot = self.slot_or_insert(device_id);
            let mut entry = slot.lock().await;
            if !self.is_current(device_id, &slot) {
                // retired while we waited, e.g. by an expiry
                continue;
            }
            if entry.is_some() {
                tracing::info!("device already bridged, ignoring announcement");
                return Ok(Registration::AlreadyTracked);
            }

            let mut adapter = Adapter::new(device);
            return match adapter.start(&self.transport, &self.settings).await {
                Ok(()) => {
                    *entry = Some(adapter);
                    tracing::info!(bridged = self.registry().len(), "device bridged");
                    Ok(Registration::Started)
                }
                Err(err) => {
                    self.retire(device_id, &slot);
                    match self.settings.start_failure {
                        StartFailurePolicy::Abort => {
                            tracing::error!(error = %err, "adapter failed to start");
                            Err(err)
                        }
                        StartFailurePolicy::Skip => {
                            tracing::warn!(error = %err, "adapter failed to start, skipping device");
                            Ok(Registration::Skipped)
                        }
                    }
                }
            };
        }
    }

    /// Tear down the adapter of a device that went away.
    #[tracing::instrument(skip(self))]
    pub async fn device_expired(&self, device_id: DeviceId) -> Removal {
        loop {
            let Some(slot) = self.registry().get(&device_id).cloned() else {
                tracing::debug!("expired device was not bridged");
                return Removal::NotTracked;
            };
            let mut entry = slot.lock().await;
            if !self.is_current(device_id, &slot) {
                continue;
            }
            let Some(mut adapter) = entry.take() else {
                tracing::debug!("expired device has no running adapter");
                return Removal::NotTracked;
            };

            if let Err(err) = adapter.stop(self.settings.stop_timeout).await {
                tracing::warn!(error = %err, "adapter teardown reported an error");
            }
            self.retire(device_id, &slot);
            tracing::info!(bridged = self.registry().len(), "device removed");
            return Removal::Stopped;
        }
    }

    /// Stop and remove every adapter.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        let mut slots: Vec<_> = self
            .registry()
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();
        slots.sort_by_key(|(id, _)| *id);

        for (device_id, slot) in slots {
            let mut entry = slot.lock().await;
            if let Some(mut adapter) = entry.take() {
                if let Err(err) = adapter.stop(self.settings.stop_timeout).await {
                    tracing::warn!(%device_id, error = %err, "adapter teardown reported an error");
                }
            }
            self.retire(device_id, &slot);
        }
        tracing::info!("all adapters stopped");
    }

    /// Summaries of every registered adapter, ordered by device id.
    pub async fn adapters(&self) -> Vec<AdapterSummary> {
        let mut summaries = Vec::new();
        for slot in self.slots() {
            if let Some(adapter) = slot.lock().await.as_ref() {
                summaries.push(adapter.summary());
            }
        }
        summaries.sort_by_key(|s| s.device_id);
        summaries
    }

    /// The accessory bridged for `device_id`, if any.
    pub async fn accessory(&self, device_id: DeviceId) -> Option<Arc<Accessory>> {
        let slot = self.registry().get(&device_id).cloned()?;
        let entry = slot.lock().await;
        entry
            .as_ref()
            .and_then(|adapter| adapter.accessory().cloned())
    }

    pub async fn is_tracked(&self, device_id: DeviceId) -> bool {
        let Some(slot) = self.registry().get(&device_id).cloned() else {
            return false;
        };
        slot.lock().await.is_some()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<DeviceId, Slot<D, T::Server>>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slots(&self) -> Vec<Slot<D, T::Server>> {
        self.registry().values().cloned().collect()
    }

    fn slot_or_insert(&self, device_id: DeviceId) -> Slot<D, T::Server> {
        Arc::clone(self.registry().entry(device_id).or_default())
    }

    fn is_current(&self, device_id: DeviceId, slot: &Slot<D, T::Server>) -> bool {
        self.registry()
            .get(&device_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Drop `slot` from the registry unless it was already replaced.
    fn retire(&self, device_id: DeviceId, slot: &Slot<D, T::Server>) {
        let mut registry = self.registry();
        if registry
            .get(&device_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            registry.remove(&device_id);
        }
    }
}
