//! Adapter — bridges one device to one accessory.
//!
//! Lifecycle: [`AdapterState::Created`] → [`AdapterState::Started`] →
//! [`AdapterState::Stopped`] (terminal). A running adapter owns:
//!
//! - the device subscription, consumed by a translation task that applies
//!   inbound events to the accessory through the silent-set path;
//! - a command task that forwards commands built by the remote-update
//!   handler to the device;
//! - the accessory server returned by the transport.
//!
//! The subscription and the server are started and stopped together.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use hkmiio_domain::accessory::{AccessoryDescriptor, AccessoryInfo, storage_dir_name};
use hkmiio_domain::command::OutboundCommand;
use hkmiio_domain::device::DeviceKind;
use hkmiio_domain::error::BridgeError;
use hkmiio_domain::event::InboundEvent;
use hkmiio_domain::id::DeviceId;
use hkmiio_domain::time::{Timestamp, now, since};

use crate::accessory::Accessory;
use crate::ports::{AccessoryServer, AccessoryTransport, DeviceHandle, Subscription};
use crate::profile::{DeviceProfile, profile_for};
use crate::settings::BridgeSettings;

/// Lifecycle state of an [`Adapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Created,
    Started,
    Stopped,
}

/// Read-only view of an adapter for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSummary {
    pub device_id: DeviceId,
    pub kind: DeviceKind,
    pub state: AdapterState,
    pub started_at: Option<Timestamp>,
}

struct Running<S> {
    server: S,
    shutdown: watch::Sender<bool>,
    translation: JoinHandle<()>,
    commands: JoinHandle<()>,
}

/// Per-device bridge between the device protocol and the accessory transport.
pub struct Adapter<D, S> {
    device: Arc<D>,
    profile: &'static dyn DeviceProfile,
    state: AdapterState,
    started_at: Option<Timestamp>,
    accessory: Option<Arc<Accessory>>,
    running: Option<Running<S>>,
}

impl<D: DeviceHandle, S: AccessoryServer> Adapter<D, S> {
    /// Create an adapter for `device`, selecting the profile for its kind.
    #[must_use]
    pub fn new(device: D) -> Self {
        let profile = profile_for(device.kind());
        Self {
            device: Arc::new(device),
            profile,
            state: AdapterState::Created,
            started_at: None,
            accessory: None,
            running: None,
        }
    }

    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device.id()
    }

    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.profile.kind()
    }

    #[must_use]
    pub fn state(&self) -> AdapterState {
        self.state
    }

    /// The accessory built by [`start`](Self::start), if it ran.
    #[must_use]
    pub fn accessory(&self) -> Option<&Arc<Accessory>> {
        self.accessory.as_ref()
    }

    #[must_use]
    pub fn summary(&self) -> AdapterSummary {
        AdapterSummary {
            device_id: self.device_id(),
            kind: self.kind(),
            state: self.state,
            started_at: self.started_at,
        }
    }

    /// Subscribe to the device, build and serve the accessory, and spawn the
    /// translation and command tasks.
    ///
    /// Only a `Created` adapter starts; calling this in any other state is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Subscription`] if the device refuses the
    /// subscription, or [`BridgeError::TransportStart`] if the accessory
    /// server cannot start. The adapter stays `Created` in both cases and
    /// holds no open resources.
    pub async fn start<T>(&mut self, transport: &T, settings: &BridgeSettings) -> Result<(), BridgeError>
    where
        T: AccessoryTransport<Server = S>,
    {
        let device_id = self.device_id();
        if self.state != AdapterState::Created {
            tracing::warn!(%device_id, state = ?self.state, "adapter already started once, ignoring start");
            return Ok(());
        }

        let mut subscription = self.device.subscribe().await?;

        let accessory = Arc::new(Accessory::new(
            device_id,
            self.kind(),
            self.profile.characteristics(),
        ));

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let profile = self.profile;
        accessory.on_remote_update(Box::new(move |characteristic, snapshot| {
            match profile.translate_remote(characteristic, snapshot) {
                Some(command) => {
                    if commands_tx.send(command).is_err() {
                        tracing::warn!(%device_id, %command, "adapter stopped, command not sent");
                    }
                }
                None => {
                    tracing::debug!(%device_id, %characteristic, "remote update has no device command");
                }
            }
        }));

        let descriptor = AccessoryDescriptor {
            device_id,
            kind: self.kind(),
            info: AccessoryInfo::for_device(device_id, self.kind()),
            characteristics: self.profile.characteristics().to_vec(),
            pairing_secret: settings.pairing_secret.clone(),
            storage_path: settings.storage_dir.join(storage_dir_name(device_id)),
        };
        tracing::info!(%device_id, name = %descriptor.info.name, "starting accessory transport");

        let server = match transport.start(descriptor, Arc::clone(&accessory)).await {
            Ok(server) => server,
            Err(err) => {
                subscription.close();
                return Err(err);
            }
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let translation = tokio::spawn(translate_events(
            Arc::clone(&accessory),
            self.profile,
            subscription,
            shutdown_rx.clone(),
        ));
        let commands = tokio::spawn(dispatch_commands(
            Arc::clone(&self.device),
            commands_rx,
            shutdown_rx,
        ));

        self.accessory = Some(accessory);
        self.running = Some(Running {
            server,
            shutdown,
            translation,
            commands,
        });
        self.started_at = Some(now());
        self.state = AdapterState::Started;
        tracing::info!(%device_id, kind = %self.kind(), "adapter started");
        Ok(())
    }

    /// Close the subscription, wait for the background tasks, then stop the
    /// accessory server.
    ///
    /// Commands already accepted from controllers are still delivered. Each
    /// background task, and the server stop, gets at most `timeout`; a task
    /// that overruns is aborted. The adapter ends `Stopped` even when
    /// teardown reports an error. Calling this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first teardown problem: [`BridgeError::StopTimeout`],
    /// [`BridgeError::TaskFailed`] or the server's
    /// [`BridgeError::TransportStop`].
    pub async fn stop(&mut self, timeout: Duration) -> Result<(), BridgeError> {
        let device_id = self.device_id();
        let Some(running) = self.running.take() else {
            self.state = AdapterState::Stopped;
            return Ok(());
        };

        // receivers are only gone if both tasks already exited
        let _ = running.shutdown.send(true);

        let mut outcome = Ok(());
        for task in [running.translation, running.commands] {
            if let Err(err) = join_within(device_id, task, timeout).await {
                outcome = outcome.and(Err(err));
            }
        }
        let server_stop = match tokio::time::timeout(timeout, running.server.stop()).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::StopTimeout { device_id, timeout }),
        };
        outcome = outcome.and(server_stop);

        self.state = AdapterState::Stopped;
        let bridged_for = self.started_at.map(since).unwrap_or_default();
        tracing::info!(%device_id, ?bridged_for, "adapter stopped");
        outcome
    }
}

async fn join_within(
    device_id: DeviceId,
    task: JoinHandle<()>,
    timeout: Duration,
) -> Result<(), BridgeError> {
    let abort = task.abort_handle();
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            tracing::error!(%device_id, %err, "adapter task failed");
            Err(BridgeError::TaskFailed {
                device_id,
                source: Box::new(err),
            })
        }
        Err(_) => {
            abort.abort();
            Err(BridgeError::StopTimeout { device_id, timeout })
        }
    }
}

/// Apply inbound events in arrival order until shutdown or the device hangs up.
async fn translate_events(
    accessory: Arc<Accessory>,
    profile: &'static dyn DeviceProfile,
    mut subscription: Subscription,
    mut shutdown: watch::Receiver<bool>,
) {
    let device_id = accessory.device_id();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            event = subscription.recv() => {
                let Some(event) = event else {
                    tracing::debug!(%device_id, "device closed the subscription");
                    break;
                };
                apply_inbound(&accessory, profile, &event);
            }
        }
    }
    subscription.close();
}

fn apply_inbound(accessory: &Accessory, profile: &dyn DeviceProfile, event: &InboundEvent) {
    let device_id = accessory.device_id();
    tracing::debug!(%device_id, %event, "handling event");
    match profile.translate_inbound(event) {
        Ok(updates) => {
            if let Err(err) = accessory.silent_set(&updates) {
                tracing::warn!(%device_id, %event, %err, "dropping event with invalid values");
            }
        }
        Err(err) => tracing::warn!(%device_id, %err, "dropping unsupported event"),
    }
}

/// Forward commands built by the remote-update handler to the device.
///
/// On shutdown the queue is closed and whatever it still holds is sent
/// before the task exits.
async fn dispatch_commands<D: DeviceHandle>(
    device: Arc<D>,
    mut commands: mpsc::UnboundedReceiver<OutboundCommand>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            command = commands.recv() => {
                let Some(command) = command else { return };
                send_command(device.as_ref(), command).await;
            }
        }
    }

    commands.close();
    while let Some(command) = commands.recv().await {
        send_command(device.as_ref(), command).await;
    }
}

async fn send_command<D: DeviceHandle>(device: &D, command: OutboundCommand) {
    let device_id = device.id();
    tracing::debug!(%device_id, %command, "sending command");
    if let Err(err) = device.execute(command).await {
        tracing::warn!(%device_id, %command, %err, "device command failed");
    }
}
