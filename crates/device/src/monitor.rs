//! Device connection monitor.
//!
//! The monitor checks the device through the shared [DeviceQueue]
//! and republishes the resulting [ConnectionStatus] to subscribers.
//! Polling only runs while at least one subscriber exists: the first
//! subscription spawns the polling task and the last unsubscribe
//! cancels it. The next check is scheduled once the previous one has
//! finished so a slow device delays polling but never overlaps it.
use std::{
    collections::BTreeMap,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::Duration,
};
use tokio::{runtime::Handle, sync::watch, task::JoinHandle};

use crate::{
    app, ConnectionStatus, DeviceQueue, DeviceSession, DeviceState,
    Error, Result,
};

/// Identifier returned by [ConnectionMonitor::subscribe].
pub type SubscriptionId = u64;

type Callback = Arc<dyn Fn(&ConnectionStatus) + Send + Sync>;

/// Options for the connection monitor.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Delay between the end of one check and the start of the next.
    pub poll_interval: Duration,
    /// Account used to query the public address.
    pub account: u32,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            account: 0,
        }
    }
}

/// Cancel handle for the polling task.
struct PollTask {
    handle: JoinHandle<()>,
}

impl PollTask {
    fn cancel(self) {
        self.handle.abort();
    }
}

struct Shared {
    queue: DeviceQueue,
    options: MonitorOptions,
    runtime: Handle,
    next_id: AtomicU64,
    // lock order: poller before subscribers
    poller: Mutex<Option<PollTask>>,
    subscribers: Mutex<BTreeMap<SubscriptionId, Callback>>,
    status: watch::Sender<ConnectionStatus>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let poller = self
            .poller
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = poller.take() {
            task.cancel();
        }
    }
}

/// Publishes the connection status of the attached device.
#[derive(Clone)]
pub struct ConnectionMonitor {
    inner: Arc<Shared>,
}

impl ConnectionMonitor {
    /// Create a monitor using the device queue.
    ///
    /// Must be called from within a tokio runtime which is used
    /// to run the polling task.
    pub fn new(
        queue: DeviceQueue,
        options: MonitorOptions,
    ) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let (status, _) =
            watch::channel(ConnectionStatus::default());
        Ok(Self {
            inner: Arc::new(Shared {
                queue,
                options,
                runtime,
                next_id: AtomicU64::new(1),
                poller: Mutex::new(None),
                subscribers: Mutex::new(BTreeMap::new()),
                status,
            }),
        })
    }

    /// Most recently published status.
    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.borrow().clone()
    }

    /// Receiver that observes every published status.
    ///
    /// A watch receiver does not count as a subscriber and does
    /// not start polling.
    pub fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Register a callback for status updates.
    ///
    /// The first subscriber starts polling.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let mut poller = lock(&self.inner.poller);
        lock(&self.inner.subscribers).insert(id, Arc::new(callback));
        if poller.is_none() {
            tracing::debug!("status polling started");
            let handle = self
                .inner
                .runtime
                .spawn(poll(Arc::downgrade(&self.inner)));
            *poller = Some(PollTask { handle });
        }
        id
    }

    /// Remove a subscription.
    ///
    /// Removing the last subscriber cancels polling. Returns whether
    /// the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut poller = lock(&self.inner.poller);
        let mut subscribers = lock(&self.inner.subscribers);
        let removed = subscribers.remove(&id).is_some();
        if subscribers.is_empty() {
            if let Some(task) = poller.take() {
                tracing::debug!("status polling stopped");
                task.cancel();
            }
        }
        removed
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    /// Whether the polling task is scheduled.
    pub fn is_polling(&self) -> bool {
        lock(&self.inner.poller).is_some()
    }

    /// Check the device now and publish the result.
    pub async fn check(&self) -> Result<ConnectionStatus> {
        let account = self.inner.options.account;
        let state = self
            .inner
            .queue
            .enqueue(move |session| inspect(session, account))
            .await;
        match state {
            Ok(state) => {
                let status = ConnectionStatus::from(state);
                self.publish(status.clone());
                Ok(status)
            }
            Err(e) => {
                self.publish(DeviceState::Disconnected.into());
                Err(e)
            }
        }
    }

    /// Open the transport and query the device.
    pub async fn connect(&self) -> Result<ConnectionStatus> {
        let opened = self
            .inner
            .queue
            .enqueue(|session| session.connect())
            .await?;
        if let Err(e) = opened {
            self.publish(DeviceState::Disconnected.into());
            return Err(e.into());
        }
        self.check().await
    }

    /// Close the transport.
    pub async fn disconnect(&self) -> Result<()> {
        self.inner
            .queue
            .enqueue(|session| session.disconnect())
            .await?;
        self.publish(DeviceState::Disconnected.into());
        Ok(())
    }

    fn publish(&self, status: ConnectionStatus) {
        let previous = self.inner.status.send_replace(status.clone());
        if previous != status {
            tracing::info!(
                state = ?status.state(),
                "device status changed"
            );
        }

        let callbacks: Vec<Callback> =
            lock(&self.inner.subscribers).values().cloned().collect();
        for callback in callbacks {
            let outcome =
                catch_unwind(AssertUnwindSafe(|| callback(&status)));
            if outcome.is_err() {
                tracing::warn!("status subscriber panicked");
            }
        }
    }
}

async fn poll(shared: Weak<Shared>) {
    loop {
        let Some(inner) = shared.upgrade() else {
            break;
        };
        let monitor = ConnectionMonitor { inner };
        if let Err(e) = monitor.check().await {
            tracing::warn!(error = %e, "status poll failed");
        }

        let interval = {
            let mut poller = lock(&monitor.inner.poller);
            if lock(&monitor.inner.subscribers).is_empty() {
                *poller = None;
                break;
            }
            monitor.inner.options.poll_interval
        };

        drop(monitor);
        tokio::time::sleep(interval).await;
    }
}

/// Check the device and derive its state.
///
/// Runs on the queue worker. A check that finds no usable device
/// closes the transport so the next check reconnects.
fn inspect(session: &mut DeviceSession, account: u32) -> DeviceState {
    if let Err(e) = session.connect() {
        tracing::trace!(error = %e, "device unavailable");
        return DeviceState::Disconnected;
    }

    let state = match query(session, account) {
        Ok(state) => state,
        Err(e) => {
            tracing::debug!(
                code = %e.code(),
                error = %e,
                "device status query failed"
            );
            DeviceState::from_error_kind(e.kind())
        }
    };

    if state == DeviceState::Disconnected {
        session.disconnect();
    }
    state
}

fn query(
    session: &mut DeviceSession,
    account: u32,
) -> Result<DeviceState> {
    let info = app::app_info(session)?;
    if !info.is_signing_app() {
        return Ok(DeviceState::AppClosed);
    }

    let public_address = app::public_address(session, account)?;
    let device_name = session.label().unwrap_or_default().to_string();
    Ok(DeviceState::Ready {
        public_address,
        device_name,
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
