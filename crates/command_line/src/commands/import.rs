//! Import the device account.
use anyhow::Result;
use coldsig_ceremony::import_hardware_account;

use crate::context::Context;

pub async fn run(context: &Context) -> Result<()> {
    let address =
        import_hardware_account(&context.monitor, &context.store)
            .await?;
    println!("{}", address);
    Ok(())
}
