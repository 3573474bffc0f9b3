//! Virtual device — a simulated power plug or Yeelight.
//!
//! The device keeps its own state. Commands update that state and the
//! device reports the result back over its subscription, the same way a
//! real miIO device echoes a successful `set_power`. The current state is
//! also reported right after a subscription opens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use hkmiio_app::ports::{DeviceHandle, Subscription};
use hkmiio_domain::command::OutboundCommand;
use hkmiio_domain::device::{DeviceKind, PowerState};
use hkmiio_domain::error::BridgeError;
use hkmiio_domain::event::InboundEvent;
use hkmiio_domain::id::DeviceId;

/// Buffered events per subscription before reports are dropped.
const SUBSCRIPTION_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy)]
struct SimulatedState {
    power: PowerState,
    hue: u16,
    brightness: u8,
    saturation: u8,
}

impl Default for SimulatedState {
    fn default() -> Self {
        Self {
            power: PowerState::Off,
            hue: 0,
            brightness: 100,
            saturation: 0,
        }
    }
}

struct Inner {
    id: DeviceId,
    kind: DeviceKind,
    state: Mutex<SimulatedState>,
    subscriber: Mutex<Option<mpsc::Sender<InboundEvent>>>,
    commands: Mutex<Vec<OutboundCommand>>,
    unreachable: AtomicBool,
}

/// A simulated miIO device. Cloning yields another handle to the same device.
#[derive(Clone)]
pub struct VirtualDevice {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for VirtualDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualDevice")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .finish_non_exhaustive()
    }
}

impl VirtualDevice {
    /// Create a device that starts switched off at full brightness.
    #[must_use]
    pub fn new(id: DeviceId, kind: DeviceKind) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                kind,
                state: Mutex::new(SimulatedState::default()),
                subscriber: Mutex::new(None),
                commands: Mutex::new(Vec::new()),
                unreachable: AtomicBool::new(false),
            }),
        }
    }

    /// Make subsequent subscription attempts fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Every command received so far, oldest first.
    #[must_use]
    pub fn commands(&self) -> Vec<OutboundCommand> {
        lock(&self.inner.commands).clone()
    }

    #[must_use]
    pub fn power(&self) -> PowerState {
        lock(&self.inner.state).power
    }

    /// Whether a subscriber is currently listening.
    #[must_use]
    pub fn has_subscriber(&self) -> bool {
        lock(&self.inner.subscriber)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Simulate a state change made on the device itself (e.g. a physical
    /// button press). Returns whether a subscriber received the report.
    pub async fn report(&self, event: InboundEvent) -> bool {
        self.apply_event(&event);
        let sender = lock(&self.inner.subscriber).clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    fn apply_event(&self, event: &InboundEvent) {
        let mut state = lock(&self.inner.state);
        match *event {
            InboundEvent::PowerChanged { state: power } => state.power = power,
            InboundEvent::LightChanged {
                hue,
                brightness,
                saturation,
            } => {
                state.hue = hue;
                state.brightness = brightness;
                state.saturation = saturation;
            }
        }
    }

    /// Apply a command, returning the event that reports its effect.
    fn apply_command(&self, command: OutboundCommand) -> Result<InboundEvent, BridgeError> {
        let mut state = lock(&self.inner.state);
        match (self.inner.kind, command) {
            (_, OutboundCommand::SetPower { state: power }) => {
                state.power = power;
                Ok(InboundEvent::PowerChanged { state: power })
            }
            (DeviceKind::TunableLight, OutboundCommand::SetBrightness { level }) => {
                state.brightness = level;
                Ok(light_event(&state))
            }
            (DeviceKind::TunableLight, OutboundCommand::SetHsv { hue, saturation }) => {
                state.hue = hue;
                state.saturation = saturation;
                Ok(light_event(&state))
            }
            (DeviceKind::Switch, _) => Err(BridgeError::Command {
                device_id: self.inner.id,
                command,
                source: "power plugs only support set_power".into(),
            }),
        }
    }

    fn current_events(&self) -> Vec<InboundEvent> {
        let state = *lock(&self.inner.state);
        let power = InboundEvent::PowerChanged { state: state.power };
        match self.inner.kind {
            DeviceKind::Switch => vec![power],
            DeviceKind::TunableLight => vec![power, light_event(&state)],
        }
    }

    /// Report to the subscriber without waiting; drops the event when the
    /// subscriber is not keeping up, as the UDP-based protocol would.
    fn notify(&self, event: InboundEvent) {
        let guard = lock(&self.inner.subscriber);
        let Some(tx) = guard.as_ref() else {
            return;
        };
        if let Err(err) = tx.try_send(event) {
            tracing::debug!(device_id = %self.inner.id, %event, %err, "state report not delivered");
        }
    }
}

impl DeviceHandle for VirtualDevice {
    fn id(&self) -> DeviceId {
        self.inner.id
    }

    fn kind(&self) -> DeviceKind {
        self.inner.kind
    }

    async fn subscribe(&self) -> Result<Subscription, BridgeError> {
        let device_id = self.inner.id;
        if self.inner.unreachable.load(Ordering::SeqCst) {
            return Err(BridgeError::Subscription {
                device_id,
                source: "device did not answer the handshake".into(),
            });
        }

        let (tx, subscription) = Subscription::channel(SUBSCRIPTION_CAPACITY);
        *lock(&self.inner.subscriber) = Some(tx);
        tracing::debug!(%device_id, "subscription opened");

        for event in self.current_events() {
            self.notify(event);
        }
        Ok(subscription)
    }

    async fn execute(&self, command: OutboundCommand) -> Result<(), BridgeError> {
        let device_id = self.inner.id;
        tracing::debug!(%device_id, %command, "command received");
        lock(&self.inner.commands).push(command);

        let report = self.apply_command(command)?;
        self.notify(report);
        Ok(())
    }
}

fn light_event(state: &SimulatedState) -> InboundEvent {
    InboundEvent::LightChanged {
        hue: state.hue,
        brightness: state.brightness,
        saturation: state.saturation,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
