//! Single concurrency FIFO queue for device operations.
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};
use tokio::sync::{mpsc, oneshot};

use crate::{Connector, DeviceSession, Error, Result};

type Job = Box<dyn FnOnce(&mut DeviceSession) + Send + 'static>;

/// Queue that executes device operations one at a time.
///
/// A dedicated worker thread owns the [DeviceSession] and runs
/// operations strictly in submission order, so status polling and
/// signing steps can never interleave on the transport. Cloning the
/// queue yields another handle to the same worker.
///
/// Once started an operation always runs to completion; dropping the
/// future returned by [DeviceQueue::enqueue] only discards the result.
#[derive(Clone)]
pub struct DeviceQueue {
    jobs: mpsc::UnboundedSender<Job>,
    queued: Arc<AtomicUsize>,
}

impl DeviceQueue {
    /// Spawn the worker thread owning a session for the connector.
    ///
    /// The worker exits once every handle has been dropped.
    pub fn spawn(connector: Box<dyn Connector>) -> Result<Self> {
        let (jobs, mut jobs_rx) = mpsc::unbounded_channel::<Job>();
        let queued = Arc::new(AtomicUsize::new(0));
        let counter = queued.clone();

        thread::Builder::new().name("coldsig-device".to_string()).spawn(
            move || {
                let mut session = DeviceSession::new(connector);
                while let Some(job) = jobs_rx.blocking_recv() {
                    let outcome = catch_unwind(AssertUnwindSafe(|| {
                        job(&mut session)
                    }));
                    if outcome.is_err() {
                        tracing::error!("device operation panicked");
                        session.disconnect();
                    }
                    counter.fetch_sub(1, Ordering::SeqCst);
                }
                session.disconnect();
                tracing::debug!("device queue stopped");
            },
        )?;

        Ok(Self { jobs, queued })
    }

    /// Run an operation against the session once every previously
    /// enqueued operation has finished.
    pub async fn enqueue<F, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut DeviceSession) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let job: Job = Box::new(move |session| {
            // receiver may be gone when the caller stopped waiting
            let _ = result_tx.send(operation(session));
        });

        self.queued.fetch_add(1, Ordering::SeqCst);
        if self.jobs.send(job).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::QueueClosed);
        }

        result_rx.await.map_err(|_| Error::OperationAborted)
    }

    /// Number of operations waiting or running.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}
