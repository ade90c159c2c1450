//! Subcommand implementations.
use anyhow::{bail, Result};
use coldsig_ceremony::{Output, Progress};
use tokio::{sync::watch, task::JoinHandle};

pub mod ceremony;
pub mod identity;
pub mod import;
pub mod sign;
pub mod status;

pub use ceremony::CeremonyArgs;

/// Tell the operator what a running action waits for.
pub(crate) fn report_progress(
    mut progress: watch::Receiver<Progress>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let current = *progress.borrow_and_update();
            match current {
                Progress::AwaitingDevice { approval: true } => {
                    eprintln!("approve the request on the device");
                }
                Progress::AwaitingDevice { approval: false } => {
                    eprintln!("waiting for the device");
                }
                Progress::AwaitingNode => {
                    eprintln!("waiting for the node");
                }
                Progress::Idle => {}
            }
        }
    })
}

/// Parse an output given as `address:amount[:memo]`.
pub(crate) fn parse_output(value: &str) -> Result<Output> {
    let mut parts = value.splitn(3, ':');
    let (Some(address), Some(amount)) = (parts.next(), parts.next())
    else {
        bail!("output must be address:amount[:memo]");
    };
    if address.is_empty() {
        bail!("output address must not be empty");
    }
    Ok(Output {
        public_address: address.to_string(),
        amount: amount.parse()?,
        memo: parts.next().unwrap_or_default().to_string(),
        asset_id: None,
    })
}
