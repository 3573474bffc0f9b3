//! Accessory characteristic store.
//!
//! An [`Accessory`] holds the current value of every characteristic a
//! bridged device exposes. Two write paths exist and must stay separate:
//!
//! - [`Accessory::silent_set`] applies device-driven updates. It publishes
//!   the change to the transport (so controllers are notified) and never
//!   invokes the remote-update handler.
//! - [`Accessory::remote_update`] applies a controller write. It invokes the
//!   remote-update handler exactly once and never publishes a device change.
//!
//! All values live behind a single mutex; the remote-update handler runs
//! while that mutex is held, so it sees a consistent snapshot that includes
//! the value just written.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use hkmiio_domain::characteristic::{Characteristic, CharacteristicValue};
use hkmiio_domain::device::DeviceKind;
use hkmiio_domain::error::CharacteristicError;
use hkmiio_domain::id::DeviceId;

/// Capacity of the device-change broadcast feed.
const CHANGE_FEED_CAPACITY: usize = 64;

/// Callback invoked for every controller write.
pub type RemoteUpdateHandler = Box<dyn Fn(Characteristic, &CharacteristicSnapshot) + Send + Sync>;

/// A device-originated characteristic change, published by `silent_set`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacteristicChange {
    pub device_id: DeviceId,
    pub characteristic: Characteristic,
    pub value: CharacteristicValue,
}

/// Point-in-time copy of every characteristic value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CharacteristicSnapshot {
    values: BTreeMap<Characteristic, CharacteristicValue>,
}

impl CharacteristicSnapshot {
    #[must_use]
    pub fn get(&self, characteristic: Characteristic) -> Option<CharacteristicValue> {
        self.values.get(&characteristic).copied()
    }

    #[must_use]
    pub fn bool(&self, characteristic: Characteristic) -> Option<bool> {
        self.get(characteristic).and_then(CharacteristicValue::as_bool)
    }

    #[must_use]
    pub fn number(&self, characteristic: Characteristic) -> Option<f64> {
        self.get(characteristic).and_then(CharacteristicValue::as_f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Characteristic, CharacteristicValue)> + '_ {
        self.values.iter().map(|(c, v)| (*c, *v))
    }
}

impl FromIterator<(Characteristic, CharacteristicValue)> for CharacteristicSnapshot {
    fn from_iter<I: IntoIterator<Item = (Characteristic, CharacteristicValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

struct AccessoryState {
    values: BTreeMap<Characteristic, CharacteristicValue>,
    remote_handler: Option<RemoteUpdateHandler>,
}

/// Characteristic values of one bridged accessory.
pub struct Accessory {
    device_id: DeviceId,
    kind: DeviceKind,
    state: Mutex<AccessoryState>,
    changes: broadcast::Sender<CharacteristicChange>,
}

impl std::fmt::Debug for Accessory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accessory")
            .field("device_id", &self.device_id)
            .field("kind", &self.kind)
            .field("values", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Accessory {
    /// Create an accessory exposing `characteristics`, each at its default value.
    #[must_use]
    pub fn new(device_id: DeviceId, kind: DeviceKind, characteristics: &[Characteristic]) -> Self {
        let values = characteristics
            .iter()
            .map(|c| (*c, c.default_value()))
            .collect();
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            device_id,
            kind,
            state: Mutex::new(AccessoryState {
                values,
                remote_handler: None,
            }),
            changes,
        }
    }

    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Current value of a characteristic, `None` if the accessory lacks it.
    #[must_use]
    pub fn value(&self, characteristic: Characteristic) -> Option<CharacteristicValue> {
        self.lock().values.get(&characteristic).copied()
    }

    /// Consistent copy of all values.
    #[must_use]
    pub fn snapshot(&self) -> CharacteristicSnapshot {
        CharacteristicSnapshot {
            values: self.lock().values.clone(),
        }
    }

    /// Install the handler called on every controller write, replacing any
    /// previous one.
    pub fn on_remote_update(&self, handler: RemoteUpdateHandler) {
        self.lock().remote_handler = Some(handler);
    }

    /// Subscribe to device-originated changes.
    #[must_use]
    pub fn subscribe_changes(&self) -> broadcast::Receiver<CharacteristicChange> {
        self.changes.subscribe()
    }

    /// Apply device-driven updates atomically.
    ///
    /// Every update is validated before any is applied. Values that differ
    /// from the current ones are published on the change feed. The
    /// remote-update handler is never called.
    ///
    /// # Errors
    ///
    /// Returns [`CharacteristicError`] if a characteristic is missing or a
    /// value is invalid; nothing is applied in that case.
    pub fn silent_set(
        &self,
        updates: &[(Characteristic, CharacteristicValue)],
    ) -> Result<(), CharacteristicError> {
        let mut state = self.lock();
        for (characteristic, value) in updates {
            validate(&state.values, *characteristic, *value)?;
        }

        for (characteristic, value) in updates {
            let previous = state.values.insert(*characteristic, *value);
            if previous != Some(*value) {
                // no receivers is fine: nothing is serving the accessory yet
                let _ = self.changes.send(CharacteristicChange {
                    device_id: self.device_id,
                    characteristic: *characteristic,
                    value: *value,
                });
            }
        }
        Ok(())
    }

    /// Apply a controller write and notify the remote-update handler.
    ///
    /// # Errors
    ///
    /// Returns [`CharacteristicError`] if the characteristic is missing or
    /// the value is invalid; the handler is not called in that case.
    pub fn remote_update(
        &self,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> Result<(), CharacteristicError> {
        let mut guard = self.lock();
        validate(&guard.values, characteristic, value)?;

        let state = &mut *guard;
        state.values.insert(characteristic, value);
        if let Some(handler) = &state.remote_handler {
            let snapshot = CharacteristicSnapshot {
                values: state.values.clone(),
            };
            handler(characteristic, &snapshot);
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, AccessoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate(
    values: &BTreeMap<Characteristic, CharacteristicValue>,
    characteristic: Characteristic,
    value: CharacteristicValue,
) -> Result<(), CharacteristicError> {
    if !values.contains_key(&characteristic) {
        return Err(CharacteristicError::NotPresent(characteristic));
    }
    if !characteristic.accepts(&value) {
        return Err(CharacteristicError::InvalidValue {
            characteristic,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn light() -> Accessory {
        Accessory::new(
            DeviceId::new(1),
            DeviceKind::TunableLight,
            &[
                Characteristic::On,
                Characteristic::Brightness,
                Characteristic::Hue,
                Characteristic::Saturation,
            ],
        )
    }

    #[test]
    fn should_start_with_default_values() {
        let acc = light();
        assert_eq!(
            acc.value(Characteristic::On),
            Some(CharacteristicValue::Bool(false))
        );
        assert_eq!(
            acc.value(Characteristic::Brightness),
            Some(CharacteristicValue::Int(100))
        );
    }

    #[test]
    fn should_return_none_for_missing_characteristic() {
        let acc = Accessory::new(DeviceId::new(1), DeviceKind::Switch, &[Characteristic::On]);
        assert_eq!(acc.value(Characteristic::Hue), None);
    }

    #[test]
    fn should_publish_change_on_silent_set() {
        let acc = light();
        let mut rx = acc.subscribe_changes();

        acc.silent_set(&[(Characteristic::On, CharacteristicValue::Bool(true))])
            .unwrap();

        let change = rx.try_recv().unwrap();
        assert_eq!(change.characteristic, Characteristic::On);
        assert_eq!(change.value, CharacteristicValue::Bool(true));
    }

    #[test]
    fn should_not_publish_unchanged_value_on_silent_set() {
        let acc = light();
        let mut rx = acc.subscribe_changes();

        acc.silent_set(&[(Characteristic::On, CharacteristicValue::Bool(false))])
            .unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn should_not_call_remote_handler_on_silent_set() {
        let acc = light();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        acc.on_remote_update(Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        acc.silent_set(&[(Characteristic::On, CharacteristicValue::Bool(true))])
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn should_call_remote_handler_once_with_written_value() {
        let acc = light();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        acc.on_remote_update(Box::new(move |c, snapshot| {
            sink.lock().unwrap().push((c, snapshot.number(Characteristic::Hue)));
        }));

        acc.remote_update(Characteristic::Hue, CharacteristicValue::Float(120.0))
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(Characteristic::Hue, Some(120.0))]
        );
    }

    #[test]
    fn should_not_publish_change_on_remote_update() {
        let acc = light();
        let mut rx = acc.subscribe_changes();

        acc.remote_update(Characteristic::On, CharacteristicValue::Bool(true))
            .unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(
            acc.value(Characteristic::On),
            Some(CharacteristicValue::Bool(true))
        );
    }

    #[test]
    fn should_apply_nothing_when_one_update_is_invalid() {
        let acc = light();
        let result = acc.silent_set(&[
            (Characteristic::Hue, CharacteristicValue::Float(90.0)),
            (Characteristic::Saturation, CharacteristicValue::Float(250.0)),
        ]);

        assert!(matches!(
            result,
            Err(CharacteristicError::InvalidValue {
                characteristic: Characteristic::Saturation,
                ..
            })
        ));
        assert_eq!(
            acc.value(Characteristic::Hue),
            Some(CharacteristicValue::Float(0.0))
        );
    }

    #[test]
    fn should_reject_remote_update_for_missing_characteristic() {
        let acc = Accessory::new(DeviceId::new(1), DeviceKind::Switch, &[Characteristic::On]);
        let result = acc.remote_update(Characteristic::Brightness, CharacteristicValue::Int(10));
        assert_eq!(
            result,
            Err(CharacteristicError::NotPresent(Characteristic::Brightness))
        );
    }

    #[test]
    fn should_snapshot_all_values() {
        let acc = light();
        acc.silent_set(&[
            (Characteristic::Hue, CharacteristicValue::Float(30.0)),
            (Characteristic::Saturation, CharacteristicValue::Float(40.0)),
        ])
        .unwrap();

        let snapshot = acc.snapshot();
        assert_eq!(snapshot.number(Characteristic::Hue), Some(30.0));
        assert_eq!(snapshot.number(Characteristic::Saturation), Some(40.0));
        assert_eq!(snapshot.bool(Characteristic::On), Some(false));
        assert_eq!(snapshot.iter().count(), 4);
    }
}
