//! Print the device status.
use anyhow::Result;
use coldsig_device::ConnectionStatus;
use tokio_stream::{wrappers::WatchStream, StreamExt};

use crate::context::Context;

pub async fn run(context: &Context, watch: bool) -> Result<()> {
    let monitor = &context.monitor;
    if !watch {
        let status = monitor.check().await?;
        print_status(&status)?;
        return Ok(());
    }

    // a subscriber keeps the poller running
    let id = monitor.subscribe(|_| {});
    let mut changes = WatchStream::new(monitor.watch());
    loop {
        tokio::select! {
            status = changes.next() => match status {
                Some(status) => print_status(&status)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    monitor.unsubscribe(id);
    Ok(())
}

fn print_status(status: &ConnectionStatus) -> Result<()> {
    println!("{}", serde_json::to_string(status)?);
    Ok(())
}
