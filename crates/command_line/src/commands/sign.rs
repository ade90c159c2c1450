//! Sign with the device key.
use anyhow::Result;
use coldsig_ceremony::{SingleKeySigner, UnsignedTransaction};

use crate::context::Context;

pub async fn run(
    context: &Context,
    transaction: &str,
    broadcast: bool,
) -> Result<()> {
    let transaction: UnsignedTransaction = transaction.parse()?;
    let signer = SingleKeySigner::new(
        context.signer.clone(),
        context.monitor.clone(),
        context.rpc.clone(),
    );
    let progress = super::report_progress(signer.progress());
    let result = signer.sign_and_submit(&transaction, broadcast).await;
    progress.abort();

    let result = result?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
