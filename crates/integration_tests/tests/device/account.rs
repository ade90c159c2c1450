use anyhow::{Context, Result};
use coldsig_ceremony::{
    import_hardware_account, NodeRpc, Output, SingleKeySigner,
};
use coldsig_device::emulator::Presence;
use std::sync::Arc;

use crate::test_utils::{
    init_tracing, Device, MemoryNode, MemoryStore, ACCOUNT,
};

/// The device account is recorded once it is ready.
#[tokio::test]
async fn integration_import_hardware_account() -> Result<()> {
    init_tracing();
    let device = Device::new(7)?;
    let store = MemoryStore::default();

    device.emulator.set_presence(Presence::Locked);
    let error = import_hardware_account(&device.monitor, &store)
        .await
        .err()
        .context("locked device imported")?;
    assert_eq!("DEVICE_NOT_READY", error.code());
    assert!(store.hardware_signers().is_empty());

    device.emulator.set_presence(Presence::AppOpen);
    let address =
        import_hardware_account(&device.monitor, &store).await?;
    assert_eq!(device.emulator.public_address(0), address);
    assert_eq!(vec![address], store.hardware_signers());
    Ok(())
}

/// A single key transaction is signed, submitted and known to the
/// node afterwards; a failed submission leaves the outcome unknown.
#[tokio::test]
async fn integration_single_key_signing() -> Result<()> {
    init_tracing();
    let device = Device::new(8)?;
    let node = Arc::new(MemoryNode::default());
    let signer = SingleKeySigner::new(
        device.signer.clone(),
        device.monitor.clone(),
        node.clone(),
    );
    let outputs = vec![Output {
        public_address: "d4".repeat(32),
        amount: 3,
        memo: String::new(),
        asset_id: None,
    }];

    let unsigned =
        node.build_unsigned_transaction(ACCOUNT, &outputs).await?;
    let result = signer.sign_and_submit(&unsigned, true).await?;
    assert!(result.accepted);
    let summary = node
        .get_transaction(ACCOUNT, &result.hash)
        .await?
        .context("transaction not posted")?;
    assert_eq!(outputs, summary.outputs);

    let unsigned =
        node.build_unsigned_transaction(ACCOUNT, &outputs).await?;
    node.fail_broadcast(true);
    let error = signer
        .sign_and_submit(&unsigned, true)
        .await
        .err()
        .context("failed broadcast reported success")?;
    assert_eq!("BROADCAST_OUTCOME_UNKNOWN", error.code());
    assert_eq!(1, node.posted());
    Ok(())
}
