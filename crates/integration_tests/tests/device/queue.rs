use anyhow::Result;
use futures::future::try_join_all;
use std::time::Duration;

use crate::test_utils::{init_tracing, Device};

/// Status checks and signing requests issued together never reach
/// the transport at the same time.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn integration_queue_serializes_exchanges() -> Result<()> {
    init_tracing();
    let device = Device::new(6)?;
    device.emulator.set_delay(Duration::from_millis(5));

    let identities = (0..4u8).map(|index| {
        let signer = device.signer.clone();
        tokio::spawn(async move { signer.derive_identity(index).await })
    });
    let checks = (0..4).map(|_| {
        let monitor = device.monitor.clone();
        tokio::spawn(async move { monitor.check().await })
    });

    let identities = try_join_all(identities).await?;
    let checks = try_join_all(checks).await?;

    for (index, identity) in identities.into_iter().enumerate() {
        assert_eq!(device.emulator.identity(index as u8)?, identity?);
    }
    for status in checks {
        assert!(status?.is_ready());
    }
    assert_eq!(1, device.emulator.max_in_flight());
    assert_eq!(1, device.emulator.opens());
    Ok(())
}
