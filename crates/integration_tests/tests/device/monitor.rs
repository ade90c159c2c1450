use anyhow::Result;
use coldsig_device::{emulator::Presence, ConnectionStatus, DeviceState};
use serde_json::json;
use std::sync::{Arc, Mutex};

use crate::test_utils::{init_tracing, wait_for, Device};

/// Every presence of the device maps to one consistent status.
#[tokio::test]
async fn integration_monitor_status_shapes() -> Result<()> {
    init_tracing();
    let device = Device::new(4)?;

    device.emulator.set_presence(Presence::Absent);
    let status = device.monitor.check().await?;
    assert_eq!(&DeviceState::Disconnected, status.state());
    assert_eq!(
        json!({
            "isLedgerConnected": false,
            "isLedgerUnlocked": false,
            "isIronfishAppOpen": false,
            "publicAddress": null,
            "deviceName": null,
        }),
        serde_json::to_value(&status)?
    );

    device.emulator.set_presence(Presence::Locked);
    let status = device.monitor.check().await?;
    assert_eq!(&DeviceState::Locked, status.state());
    assert!(status.is_ledger_connected());
    assert!(!status.is_ledger_unlocked());

    device.emulator.set_presence(Presence::Dashboard);
    let status = device.monitor.check().await?;
    assert_eq!(&DeviceState::AppClosed, status.state());
    assert!(status.is_ledger_unlocked());
    assert!(!status.is_app_open());

    device.emulator.set_presence(Presence::AppOpen);
    let status = device.monitor.check().await?;
    assert!(status.is_ready());
    let address = device.emulator.public_address(0);
    assert_eq!(Some(address.as_str()), status.public_address());
    assert_eq!(
        json!({
            "isLedgerConnected": true,
            "isLedgerUnlocked": true,
            "isIronfishAppOpen": true,
            "publicAddress": address,
            "deviceName": device.emulator.label(),
        }),
        serde_json::to_value(&status)?
    );
    assert_eq!(status, device.monitor.status());
    Ok(())
}

/// Subscribers see changes while polling runs and polling stops
/// with the last subscriber.
#[tokio::test]
async fn integration_monitor_subscriptions() -> Result<()> {
    init_tracing();
    let device = Device::new(5)?;
    assert!(!device.monitor.is_polling());

    let seen: Arc<Mutex<Vec<ConnectionStatus>>> = Default::default();
    let first = {
        let seen = seen.clone();
        device.monitor.subscribe(move |status| {
            seen.lock().unwrap().push(status.clone())
        })
    };
    let second = device.monitor.subscribe(|_| {});
    assert!(device.monitor.is_polling());
    assert_eq!(2, device.monitor.subscriber_count());

    assert!(wait_for(|| device.monitor.status().is_ready()).await);

    device.emulator.set_presence(Presence::Locked);
    assert!(
        wait_for(|| seen
            .lock()
            .unwrap()
            .iter()
            .any(|s| s.state() == &DeviceState::Locked))
        .await
    );

    assert!(device.monitor.unsubscribe(first));
    assert!(!device.monitor.unsubscribe(first));
    assert!(device.monitor.is_polling());
    assert!(device.monitor.unsubscribe(second));
    assert!(!device.monitor.is_polling());

    // no checks once polling stopped
    let exchanges = device.emulator.exchanges();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(exchanges, device.emulator.exchanges());
    Ok(())
}
