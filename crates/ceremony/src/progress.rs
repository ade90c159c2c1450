//! What a long running action is waiting for.
use coldsig_device::{ConnectionMonitor, ConnectionStatus};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

use crate::{Error, Result};

/// Progress of the running action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Progress {
    /// Nothing running.
    #[default]
    Idle,
    /// Waiting for the device.
    AwaitingDevice {
        /// Whether the operator must approve on the device screen.
        approval: bool,
    },
    /// Waiting for the node.
    AwaitingNode,
}

#[derive(Clone)]
pub(crate) struct Reporter {
    sender: Arc<watch::Sender<Progress>>,
}

impl Reporter {
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(Progress::Idle);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Progress> {
        self.sender.subscribe()
    }

    /// Report progress until the guard is dropped.
    pub(crate) fn begin(&self, progress: Progress) -> ProgressGuard {
        self.sender.send_replace(progress);
        ProgressGuard {
            sender: self.sender.clone(),
        }
    }
}

/// Resets progress to idle when dropped.
pub(crate) struct ProgressGuard {
    sender: Arc<watch::Sender<Progress>>,
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        self.sender.send_replace(Progress::Idle);
    }
}

/// Check the device and fail with [Error::DeviceNotReady] unless it
/// is ready.
///
/// The status may still change before the following device call,
/// which then fails with its own classified error.
pub async fn require_ready(
    monitor: &ConnectionMonitor,
) -> Result<ConnectionStatus> {
    let status = monitor.check().await?;
    if !status.is_ready() {
        tracing::info!(state = ?status.state(), "device not ready");
        return Err(Error::DeviceNotReady(status.state().clone()));
    }
    Ok(status)
}
