//! Command line tool for signing with hardware signing devices.
//!
//! Queries the attached device, imports its account, signs single
//! key transactions and walks an operator through a threshold
//! signing ceremony where artifacts are copied between parties as
//! hex text.
//!
//! # Configuration
//!
//! Settings are read from an optional TOML file (`coldsig.toml`):
//!
//! ```toml
//! [device]
//! poll-interval = 500
//! account = 0
//!
//! [rpc]
//! address = "127.0.0.1:8020"
//!
//! [store]
//! path = "accounts.json"
//! ```
//!
//! # Status
//!
//! Print the device status, following changes with `--watch`:
//!
//! ```no_run
//! coldsig --config coldsig.toml status --watch
//! ```
//!
//! # Ceremony
//!
//! Run the coordinator side of a ceremony:
//!
//! ```no_run
//! coldsig ceremony coordinator --account multisig \
//!   --output <address>:100
//! ```
//!
//! Pass `--emulator` to run against an in-process device.

mod commands;
mod config;
mod context;
mod rpc;
mod store;

#[doc(hidden)]
mod cli {
    use anyhow::Result;
    use clap::{Parser, Subcommand};
    use coldsig_ceremony::Output;
    use std::path::PathBuf;

    use super::{
        commands::{self, CeremonyArgs},
        context::Context,
    };

    #[derive(Parser, Debug)]
    #[clap(author, version, about, long_about = None)]
    pub struct Coldsig {
        /// Config file to load.
        #[clap(short, long, global = true)]
        config: Option<PathBuf>,

        /// Override the node JSON-RPC address.
        #[clap(long, global = true, env = "COLDSIG_RPC")]
        rpc: Option<String>,

        /// Use an in-process emulated device.
        #[clap(long, global = true)]
        emulator: bool,

        #[clap(subcommand)]
        cmd: Command,
    }

    #[derive(Debug, Subcommand)]
    pub enum Command {
        /// Print the device connection status.
        Status {
            /// Keep printing status changes until interrupted.
            #[clap(short, long)]
            watch: bool,
        },

        /// Derive a multisig identity on the device.
        Identity {
            /// Identity index.
            #[clap(short, long, default_value = "0")]
            index: u8,
        },

        /// Mark the device account as a hardware signer.
        Import,

        /// Sign a transaction with the device key and submit it.
        Sign {
            /// Hex-encoded unsigned transaction.
            #[clap(short, long)]
            transaction: String,

            /// Broadcast the transaction to the network.
            #[clap(short, long)]
            broadcast: bool,
        },

        /// Run a threshold signing ceremony.
        Ceremony {
            #[clap(subcommand)]
            role: Role,
        },
    }

    #[derive(Debug, Subcommand)]
    pub enum Role {
        /// Collect every artifact and broadcast the signature.
        Coordinator {
            #[clap(flatten)]
            args: SharedArgs,

            /// Output to pay as `address:amount[:memo]`, may repeat.
            #[clap(
                short,
                long = "output",
                value_parser = commands::parse_output
            )]
            outputs: Vec<Output>,

            /// Broadcast the transaction to the network.
            #[clap(short, long)]
            broadcast: bool,
        },

        /// Contribute one signature share.
        Participant {
            #[clap(flatten)]
            args: SharedArgs,
        },
    }

    #[derive(Debug, clap::Args)]
    pub struct SharedArgs {
        /// Multisig account name on the node.
        #[clap(short, long)]
        account: String,

        /// Hex-encoded unsigned transaction, prompted when omitted.
        #[clap(short, long)]
        transaction: Option<String>,

        /// Identity index on the device.
        #[clap(short, long, default_value = "0")]
        index: u8,
    }

    pub(super) async fn run() -> Result<()> {
        let args = Coldsig::parse();
        let context =
            Context::new(args.config, args.rpc, args.emulator).await?;
        match args.cmd {
            Command::Status { watch } => {
                commands::status::run(&context, watch).await?
            }
            Command::Identity { index } => {
                commands::identity::run(&context, index).await?
            }
            Command::Import => commands::import::run(&context).await?,
            Command::Sign {
                transaction,
                broadcast,
            } => {
                commands::sign::run(&context, &transaction, broadcast)
                    .await?
            }
            Command::Ceremony { role } => {
                let args = match role {
                    Role::Coordinator {
                        args,
                        outputs,
                        broadcast,
                    } => CeremonyArgs {
                        role: coldsig_ceremony::Role::Coordinator,
                        account: args.account,
                        transaction: args.transaction,
                        index: args.index,
                        outputs,
                        broadcast,
                    },
                    Role::Participant { args } => CeremonyArgs {
                        role: coldsig_ceremony::Role::Participant,
                        account: args.account,
                        transaction: args.transaction,
                        index: args.index,
                        outputs: Vec::new(),
                        broadcast: false,
                    },
                };
                commands::ceremony::run(&context, args).await?
            }
        }
        Ok(())
    }
}

#[doc(hidden)]
#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{
        layer::SubscriberExt, util::SubscriberInitExt,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "coldsig=info,coldsig_device=info,coldsig_ceremony=info"
                    .into()
            }),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = cli::run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }

    Ok(())
}
