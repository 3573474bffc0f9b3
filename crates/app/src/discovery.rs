//! Discovery loop — feeds device announcements to the coordinator.
//!
//! Every announcement is dispatched as its own task so a slow adapter start
//! does not hold up the stream. Dispatches for the same device run in the
//! order they were announced; each waits for the previous one to finish.
//! Dispatch tasks are joined as they finish; the first fatal error ends the
//! loop and is returned to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinSet};

use hkmiio_domain::error::BridgeError;
use hkmiio_domain::id::DeviceId;

use crate::coordinator::Coordinator;
use crate::ports::{AccessoryTransport, Announcement, DeviceClient, DeviceHandle};

/// Consume the client's announcement stream until it ends.
///
/// # Errors
///
/// Returns [`BridgeError::Discovery`] if the stream cannot be opened, or the
/// first fatal error produced by [`Coordinator::device_appeared`]. Pending
/// dispatch tasks are cancelled in that case.
pub async fn run<C, T>(client: &C, coordinator: Arc<Coordinator<C::Device, T>>) -> Result<(), BridgeError>
where
    C: DeviceClient,
    T: AccessoryTransport,
{
    let mut announcements = client.discover().await?;
    let mut dispatches = JoinSet::new();
    let mut last_dispatch = HashMap::new();
    tracing::info!("listening for device announcements");

    loop {
        tokio::select! {
            announcement = announcements.recv() => {
                let Some(announcement) = announcement else { break };
                dispatch(&mut dispatches, &mut last_dispatch, &coordinator, announcement);
            }
            Some(joined) = dispatches.join_next(), if !dispatches.is_empty() => {
                surface(joined)?;
            }
        }
    }

    tracing::info!("announcement stream ended");
    while let Some(joined) = dispatches.join_next().await {
        surface(joined)?;
    }
    Ok(())
}

/// Completion signal of the latest dispatch per device. The sender is
/// dropped when that dispatch finishes or is cancelled.
type LastDispatch = HashMap<DeviceId, oneshot::Receiver<()>>;

fn dispatch<D, T>(
    dispatches: &mut JoinSet<Result<(), BridgeError>>,
    last_dispatch: &mut LastDispatch,
    coordinator: &Arc<Coordinator<D, T>>,
    announcement: Announcement<D>,
) where
    D: DeviceHandle,
    T: AccessoryTransport,
{
    let coordinator = Arc::clone(coordinator);
    let device_id = match &announcement {
        Announcement::Appeared(device) => device.id(),
        Announcement::Expired(device_id) => *device_id,
    };
    let (done, done_rx) = oneshot::channel::<()>();
    let previous = last_dispatch.insert(device_id, done_rx);

    dispatches.spawn(async move {
        let _done = done;
        if let Some(previous) = previous {
            // resolves with an error once the previous dispatch drops its sender
            let _ = previous.await;
        }
        match announcement {
            Announcement::Appeared(device) => {
                tracing::debug!(%device_id, kind = %device.kind(), "device appeared");
                coordinator.device_appeared(device).await.map(|_| ())
            }
            Announcement::Expired(device_id) => {
                tracing::debug!(%device_id, "device expired");
                coordinator.device_expired(device_id).await;
                Ok(())
            }
        }
    });
}

fn surface(joined: Result<Result<(), BridgeError>, JoinError>) -> Result<(), BridgeError> {
    match joined {
        Ok(result) => result,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::BridgeSettings;
    use crate::testing::{FakeClient, FakeDevice, FakeTransport, eventually};

    fn coordinator(transport: &FakeTransport) -> Arc<Coordinator<FakeDevice, FakeTransport>> {
        Arc::new(Coordinator::new(
            transport.clone(),
            BridgeSettings::new("031-45-154"),
        ))
    }

    #[tokio::test]
    async fn should_register_announced_devices() {
        let (tx, client) = FakeClient::new();
        let transport = FakeTransport::default();
        let coordinator = coordinator(&transport);

        tx.send(Announcement::Appeared(FakeDevice::switch(1)))
            .await
            .unwrap();
        tx.send(Announcement::Appeared(FakeDevice::light(2)))
            .await
            .unwrap();
        drop(tx);

        run(&client, Arc::clone(&coordinator)).await.unwrap();

        assert_eq!(coordinator.adapters().await.len(), 2);
    }

    #[tokio::test]
    async fn should_remove_expired_devices() {
        let (tx, client) = FakeClient::new();
        let transport = FakeTransport::default();
        let coordinator = coordinator(&transport);
        let loop_coordinator = Arc::clone(&coordinator);
        let handle = tokio::spawn(async move { run(&client, loop_coordinator).await });

        tx.send(Announcement::Appeared(FakeDevice::switch(5)))
            .await
            .unwrap();
        let tracked = eventually(|| transport.starts() == 1).await;
        assert!(tracked);

        tx.send(Announcement::Expired(DeviceId::new(5))).await.unwrap();
        drop(tx);
        handle.await.unwrap().unwrap();

        assert!(!coordinator.is_tracked(DeviceId::new(5)).await);
        assert_eq!(transport.stops(), 1);
    }

    #[tokio::test]
    async fn should_return_fatal_start_error() {
        let (tx, client) = FakeClient::new();
        let transport = FakeTransport::failing();
        let coordinator = coordinator(&transport);

        tx.send(Announcement::Appeared(FakeDevice::switch(1)))
            .await
            .unwrap();

        let result = run(&client, coordinator).await;

        assert!(matches!(result, Err(BridgeError::TransportStart { .. })));
        drop(tx);
    }

    #[tokio::test]
    async fn should_fail_when_discovery_cannot_start() {
        let (_tx, client) = FakeClient::new();
        let transport = FakeTransport::default();
        let coordinator = coordinator(&transport);
        client.discover().await.unwrap();

        let result = run(&client, coordinator).await;

        assert!(matches!(result, Err(BridgeError::Discovery(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_handle_expiry_after_the_appearance_before_it() {
        let (tx, client) = FakeClient::new();
        let transport = FakeTransport::default();
        let coordinator = coordinator(&transport);

        for _ in 0..5 {
            tx.send(Announcement::Appeared(FakeDevice::switch(5)))
                .await
                .unwrap();
            tx.send(Announcement::Expired(DeviceId::new(5))).await.unwrap();
        }
        drop(tx);

        run(&client, Arc::clone(&coordinator)).await.unwrap();

        assert!(!coordinator.is_tracked(DeviceId::new(5)).await);
        assert_eq!(transport.starts(), 5);
        assert_eq!(transport.stops(), 5);
    }
}
