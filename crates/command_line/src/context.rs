//! Device, node and store handles shared by the commands.
use anyhow::Result;
use coldsig_ceremony::NodeRpc;
use coldsig_device::{
    emulator::DeviceEmulator, hid::HidConnector, ConnectionMonitor,
    Connector, DeviceQueue, DeviceSigner, MonitorOptions,
};
use std::{path::PathBuf, sync::Arc};

use crate::{
    config::Config, rpc::JsonRpcClient, store::FileAccountStore,
};

/// Seed of the emulated device.
const EMULATOR_SEED: [u8; 32] = [1; 32];

pub struct Context {
    pub monitor: ConnectionMonitor,
    pub signer: DeviceSigner,
    pub rpc: Arc<dyn NodeRpc>,
    pub store: FileAccountStore,
}

impl Context {
    pub async fn new(
        config: Option<PathBuf>,
        rpc: Option<String>,
        emulator: bool,
    ) -> Result<Self> {
        let mut config = match config {
            Some(path) => Config::load(path).await?,
            None => Config::default(),
        };
        if let Some(address) = rpc {
            config.rpc.address = address;
        }
        config.validate()?;

        let connector: Box<dyn Connector> = if emulator {
            tracing::info!("using emulated device");
            DeviceEmulator::new(EMULATOR_SEED).connector()
        } else {
            Box::new(HidConnector::new())
        };

        let queue = DeviceQueue::spawn(connector)?;
        let monitor = ConnectionMonitor::new(
            queue.clone(),
            MonitorOptions {
                poll_interval: config.device.poll_interval(),
                account: config.device.account,
            },
        )?;
        let signer = DeviceSigner::new(queue, config.device.account);
        tracing::debug!(rpc = %config.rpc.address, "node address");

        Ok(Self {
            monitor,
            signer,
            rpc: Arc::new(JsonRpcClient::new(config.rpc.address)),
            store: FileAccountStore::new(config.store.path),
        })
    }
}
