//! Import of the account held by the device.
use coldsig_device::ConnectionMonitor;

use crate::{progress::require_ready, AccountStore, Error, Result};

/// Mark the account of the attached device as a hardware signer.
///
/// Returns the public address of the imported account.
pub async fn import_hardware_account(
    monitor: &ConnectionMonitor,
    store: &dyn AccountStore,
) -> Result<String> {
    let status = require_ready(monitor).await?;
    let address = status
        .public_address()
        .map(|a| a.to_string())
        .ok_or_else(|| Error::DeviceNotReady(status.state().clone()))?;

    store
        .mark_account_as_hardware_signer(&address)
        .await
        .map_err(|source| Error::Step {
            step: "import account",
            source,
        })?;
    tracing::info!(address = %address, "hardware account imported");
    Ok(address)
}
