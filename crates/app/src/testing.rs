//! In-memory fakes of the device protocol and accessory transport ports.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use hkmiio_domain::accessory::AccessoryDescriptor;
use hkmiio_domain::command::OutboundCommand;
use hkmiio_domain::device::DeviceKind;
use hkmiio_domain::error::BridgeError;
use hkmiio_domain::event::InboundEvent;
use hkmiio_domain::id::DeviceId;

use crate::accessory::{Accessory, CharacteristicChange};
use crate::ports::{
    AccessoryServer, AccessoryTransport, Announcement, DeviceClient, DeviceHandle, Subscription,
};

// ── Device ─────────────────────────────────────────────────────

/// How the fake device behaves when asked to execute a command.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) enum Execution {
    #[default]
    Immediate,
    Delayed(Duration),
    Hang,
    Panic,
}

#[derive(Default)]
struct DeviceState {
    fail_subscribe: AtomicBool,
    execution: Mutex<Execution>,
    subscribe_calls: AtomicUsize,
    events: Mutex<Option<mpsc::Sender<InboundEvent>>>,
    commands: Mutex<Vec<OutboundCommand>>,
}

#[derive(Clone)]
pub(crate) struct FakeDevice {
    id: DeviceId,
    kind: DeviceKind,
    state: Arc<DeviceState>,
}

impl FakeDevice {
    pub(crate) fn new(id: u32, kind: DeviceKind) -> Self {
        Self {
            id: DeviceId::new(id),
            kind,
            state: Arc::default(),
        }
    }

    pub(crate) fn switch(id: u32) -> Self {
        Self::new(id, DeviceKind::Switch)
    }

    pub(crate) fn light(id: u32) -> Self {
        Self::new(id, DeviceKind::TunableLight)
    }

    pub(crate) fn failing_subscribe(self) -> Self {
        self.state.fail_subscribe.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn executing(self, execution: Execution) -> Self {
        *self.state.execution.lock().unwrap() = execution;
        self
    }

    pub(crate) fn subscribe_calls(&self) -> usize {
        self.state.subscribe_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn commands(&self) -> Vec<OutboundCommand> {
        self.state.commands.lock().unwrap().clone()
    }

    /// Push an event to the current subscriber. Returns whether it was accepted.
    pub(crate) async fn emit(&self, event: InboundEvent) -> bool {
        let sender = self.state.events.lock().unwrap().clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Drop the device side of the subscription.
    pub(crate) fn hang_up(&self) {
        self.state.events.lock().unwrap().take();
    }
}

impl DeviceHandle for FakeDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn kind(&self) -> DeviceKind {
        self.kind
    }

    async fn subscribe(&self) -> Result<Subscription, BridgeError> {
        self.state.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_subscribe.load(Ordering::SeqCst) {
            return Err(BridgeError::Subscription {
                device_id: self.id,
                source: "device unreachable".into(),
            });
        }
        let (tx, subscription) = Subscription::channel(16);
        *self.state.events.lock().unwrap() = Some(tx);
        Ok(subscription)
    }

    async fn execute(&self, command: OutboundCommand) -> Result<(), BridgeError> {
        let execution = *self.state.execution.lock().unwrap();
        match execution {
            Execution::Immediate => {}
            Execution::Delayed(delay) => tokio::time::sleep(delay).await,
            Execution::Hang => std::future::pending::<()>().await,
            Execution::Panic => panic!("device handle crashed on {command}"),
        }
        self.state.commands.lock().unwrap().push(command);
        Ok(())
    }
}

// ── Client ─────────────────────────────────────────────────────

pub(crate) struct FakeClient {
    announcements: Mutex<Option<mpsc::Receiver<Announcement<FakeDevice>>>>,
}

impl FakeClient {
    pub(crate) fn new() -> (mpsc::Sender<Announcement<FakeDevice>>, Self) {
        let (tx, rx) = mpsc::channel(16);
        let client = Self {
            announcements: Mutex::new(Some(rx)),
        };
        (tx, client)
    }
}

impl DeviceClient for FakeClient {
    type Device = FakeDevice;

    async fn discover(&self) -> Result<mpsc::Receiver<Announcement<FakeDevice>>, BridgeError> {
        self.announcements
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BridgeError::Discovery("already discovering".into()))
    }
}

// ── Transport ──────────────────────────────────────────────────

#[derive(Default)]
struct TransportState {
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
    hang_stop: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    descriptors: Mutex<Vec<AccessoryDescriptor>>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    state: Arc<TransportState>,
}

impl FakeTransport {
    pub(crate) fn failing() -> Self {
        let transport = Self::default();
        transport.state.fail_start.store(true, Ordering::SeqCst);
        transport
    }

    pub(crate) fn failing_stop() -> Self {
        let transport = Self::default();
        transport.state.fail_stop.store(true, Ordering::SeqCst);
        transport
    }

    /// A transport whose servers never finish tearing down.
    pub(crate) fn hanging_stop() -> Self {
        let transport = Self::default();
        transport.state.hang_stop.store(true, Ordering::SeqCst);
        transport
    }

    pub(crate) fn starts(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn descriptors(&self) -> Vec<AccessoryDescriptor> {
        self.state.descriptors.lock().unwrap().clone()
    }
}

impl AccessoryTransport for FakeTransport {
    type Server = FakeServer;

    async fn start(
        &self,
        descriptor: AccessoryDescriptor,
        _accessory: Arc<Accessory>,
    ) -> Result<FakeServer, BridgeError> {
        // widen the window between the registry check and the insert
        tokio::task::yield_now().await;
        if self.state.fail_start.load(Ordering::SeqCst) {
            return Err(BridgeError::TransportStart {
                device_id: descriptor.device_id,
                source: "address in use".into(),
            });
        }
        self.state.starts.fetch_add(1, Ordering::SeqCst);
        let device_id = descriptor.device_id;
        self.state.descriptors.lock().unwrap().push(descriptor);
        Ok(FakeServer {
            device_id,
            state: Arc::clone(&self.state),
        })
    }
}

pub(crate) struct FakeServer {
    device_id: DeviceId,
    state: Arc<TransportState>,
}

impl AccessoryServer for FakeServer {
    async fn stop(self) -> Result<(), BridgeError> {
        self.state.stops.fetch_add(1, Ordering::SeqCst);
        if self.state.hang_stop.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.state.fail_stop.load(Ordering::SeqCst) {
            return Err(BridgeError::TransportStop {
                device_id: self.device_id,
                source: "listener already closed".into(),
            });
        }
        Ok(())
    }
}

// ── Helpers ────────────────────────────────────────────────────

/// Poll `check` until it holds or a second has passed.
pub(crate) async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

/// Wait for the next device-originated change on an accessory.
pub(crate) async fn next_change(
    changes: &mut broadcast::Receiver<CharacteristicChange>,
) -> CharacteristicChange {
    tokio::time::timeout(Duration::from_secs(1), changes.recv())
        .await
        .expect("change should arrive within a second")
        .expect("change feed should stay open")
}
