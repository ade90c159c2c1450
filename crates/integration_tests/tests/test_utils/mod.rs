use anyhow::Result;
use coldsig_ceremony::Ceremony;
use coldsig_device::{
    emulator::DeviceEmulator, ConnectionMonitor, DeviceQueue,
    DeviceSigner, MonitorOptions,
};
use std::{sync::Arc, time::Duration};

mod node;
mod store;

pub use node::{MemoryNode, FEE};
pub use store::MemoryStore;

/// Account name used by every scenario.
pub const ACCOUNT: &str = "multisig";

pub fn init_tracing() {
    use tracing_subscriber::{
        layer::SubscriberExt, util::SubscriberInitExt,
    };
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "coldsig_ceremony=debug".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_test_writer(),
        )
        .try_init();
}

/// Emulated device together with the handles a party uses.
pub struct Device {
    pub emulator: DeviceEmulator,
    pub monitor: ConnectionMonitor,
    pub signer: DeviceSigner,
}

impl Device {
    pub fn new(seed: u8) -> Result<Self> {
        let emulator = DeviceEmulator::new([seed; 32]);
        let queue = DeviceQueue::spawn(emulator.connector())?;
        let monitor = ConnectionMonitor::new(
            queue.clone(),
            MonitorOptions {
                poll_interval: Duration::from_millis(10),
                account: 0,
            },
        )?;
        let signer = DeviceSigner::new(queue, 0);
        Ok(Self {
            emulator,
            monitor,
            signer,
        })
    }
}

/// Party of a ceremony with its own device.
pub struct Party {
    pub device: Device,
    pub ceremony: Ceremony,
}

impl Party {
    pub fn new(seed: u8, node: Arc<MemoryNode>) -> Result<Self> {
        let device = Device::new(seed)?;
        let ceremony = Ceremony::new(
            device.signer.clone(),
            device.monitor.clone(),
            node,
        );
        Ok(Self { device, ceremony })
    }
}

/// Poll a condition until it holds or a second has passed.
pub async fn wait_for(condition: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
