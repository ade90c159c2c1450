//! Derive a multisig identity.
use anyhow::Result;
use coldsig_ceremony::require_ready;

use crate::context::Context;

pub async fn run(context: &Context, index: u8) -> Result<()> {
    require_ready(&context.monitor).await?;
    let identity = context.signer.derive_identity(index).await?;
    println!("{}", identity.to_hex());
    Ok(())
}
