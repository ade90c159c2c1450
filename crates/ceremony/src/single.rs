//! Signing with the single device key.
use coldsig_device::{
    ConnectionMonitor, DeviceSigner, UnsignedTransaction,
};
use std::sync::Arc;
use tokio::sync::watch;

use crate::{
    progress::{require_ready, Reporter},
    BroadcastResult, Error, NodeRpc, Progress, Result,
};

/// Signs transactions of an account whose key lives on the device.
pub struct SingleKeySigner {
    signer: DeviceSigner,
    monitor: ConnectionMonitor,
    rpc: Arc<dyn NodeRpc>,
    progress: Reporter,
}

impl SingleKeySigner {
    /// Create a signer.
    pub fn new(
        signer: DeviceSigner,
        monitor: ConnectionMonitor,
        rpc: Arc<dyn NodeRpc>,
    ) -> Self {
        Self {
            signer,
            monitor,
            rpc,
            progress: Reporter::new(),
        }
    }

    /// Progress of the running request.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Sign on the device, attach the signature and submit.
    ///
    /// A submission failure leaves the outcome unknown.
    pub async fn sign_and_submit(
        &self,
        transaction: &UnsignedTransaction,
        broadcast: bool,
    ) -> Result<BroadcastResult> {
        require_ready(&self.monitor).await?;

        let signature = {
            let _progress = self
                .progress
                .begin(Progress::AwaitingDevice { approval: true });
            self.signer.sign_single_key_transaction(transaction).await?
        };

        let _progress = self.progress.begin(Progress::AwaitingNode);
        let signed = self
            .rpc
            .add_signature_to_transaction(transaction, &signature)
            .await
            .map_err(|source| Error::Step {
                step: "add signature to transaction",
                source,
            })?;

        let result = self
            .rpc
            .submit_transaction(&signed, broadcast)
            .await
            .map_err(Error::BroadcastOutcomeUnknown)?;
        tracing::info!(
            hash = %result.hash,
            accepted = result.accepted,
            "transaction submitted"
        );
        Ok(result)
    }
}
