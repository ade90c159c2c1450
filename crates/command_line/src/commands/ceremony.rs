//! Interactive threshold signing ceremony.
//!
//! Artifacts for the other parties are written to stdout, prompts
//! and progress go to stderr and pasted artifacts are read from
//! stdin one per line.
use anyhow::{bail, Result};
use coldsig_ceremony::{
    Ceremony, CeremonyState, CoordinatorState, Error, Output, Role,
    Step,
};
use std::io::Write;
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::context::Context;

/// Options of the ceremony subcommand.
#[derive(Debug)]
pub struct CeremonyArgs {
    pub role: Role,
    pub account: String,
    pub transaction: Option<String>,
    pub index: u8,
    pub outputs: Vec<Output>,
    pub broadcast: bool,
}

/// What the operator wants after a failed action.
enum Decision {
    Retry,
    Restart,
}

struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(io::stdin()).lines(),
        }
    }

    async fn ask(&mut self, message: &str) -> Result<String> {
        eprint!("{}> ", message);
        std::io::stderr().flush()?;
        match self.lines.next_line().await? {
            Some(line) => Ok(line.trim().to_string()),
            None => bail!("input closed"),
        }
    }

    async fn on_failure(&mut self, error: &Error) -> Result<Decision> {
        eprintln!("error [{}]: {}", error.code(), error);
        let question = if error.retryable() {
            "enter to retry, 'restart' or 'quit'"
        } else {
            "'restart' or 'quit'"
        };
        loop {
            match self.ask(question).await?.as_str() {
                "" if error.retryable() => return Ok(Decision::Retry),
                "restart" => return Ok(Decision::Restart),
                "quit" => bail!("ceremony abandoned"),
                _ => {}
            }
        }
    }
}

/// Run an action until it succeeds, yields `None` when the operator
/// restarts the ceremony.
macro_rules! attempt {
    ($prompt:expr, $action:expr) => {
        loop {
            let result = $action.await;
            match result {
                Ok(value) => break Some(value),
                Err(e) => match $prompt.on_failure(&e).await? {
                    Decision::Retry => continue,
                    Decision::Restart => break None,
                },
            }
        }
    };
}

pub async fn run(context: &Context, args: CeremonyArgs) -> Result<()> {
    let mut ceremony = Ceremony::new(
        context.signer.clone(),
        context.monitor.clone(),
        context.rpc.clone(),
    );
    let progress = super::report_progress(ceremony.progress());
    let result = drive(&mut ceremony, &args).await;
    progress.abort();
    result
}

async fn drive(
    ceremony: &mut Ceremony,
    args: &CeremonyArgs,
) -> Result<()> {
    let mut prompt = Prompt::new();
    loop {
        let step = ceremony.step();
        tracing::debug!(step = %step, "ceremony step");
        let completed = match step {
            Step::SelectRole => {
                ceremony.select_role(args.role)?;
                true
            }
            Step::GetUnsignedTransaction => {
                get_transaction(ceremony, &mut prompt, args).await?
            }
            Step::CollectIdentities
                if own_pending(ceremony.state()) =>
            {
                attempt!(prompt, ceremony.derive_identity(args.index))
                    .is_some()
            }
            Step::CollectIdentities => {
                collect(ceremony, &mut prompt, "identity").await?
            }
            Step::ReviewTransaction => {
                eprintln!("review the transaction on the device");
                attempt!(prompt, ceremony.review_transaction())
                    .is_some()
            }
            Step::CreateSigningCommitment
                if own_pending(ceremony.state()) =>
            {
                attempt!(prompt, ceremony.create_signing_commitment())
                    .is_some()
            }
            Step::CreateSigningCommitment => {
                collect(ceremony, &mut prompt, "commitment").await?
            }
            Step::CreateSigningPackage => match args.role {
                Role::Coordinator => {
                    attempt!(prompt, ceremony.create_signing_package())
                        .is_some()
                }
                Role::Participant => {
                    set_signing_package(ceremony, &mut prompt).await?
                }
            },
            Step::CreateSignatureShare
                if own_pending(ceremony.state()) =>
            {
                attempt!(prompt, ceremony.create_signature_share())
                    .is_some()
            }
            Step::CreateSignatureShare => {
                collect(ceremony, &mut prompt, "signature share").await?
            }
            Step::AggregateAndBroadcast => {
                let result = ceremony
                    .aggregate_and_broadcast(args.broadcast)
                    .await?;
                println!("{}", serde_json::to_string_pretty(&result)?);
                true
            }
            Step::Done => break,
        };

        if !completed {
            ceremony.restart();
            continue;
        }
        if let Some(artifact) = ceremony.export() {
            if ceremony.step() != step {
                eprintln!("send to the other parties:");
                println!("{}", artifact);
            }
        }
    }
    eprintln!("ceremony complete");
    Ok(())
}

/// Whether the own artifact of the current step is still missing.
fn own_pending(state: &CeremonyState) -> bool {
    match state {
        CeremonyState::Participant(_) => true,
        CeremonyState::Coordinator(state) => matches!(
            state,
            CoordinatorState::CollectIdentities { identity: None, .. }
                | CoordinatorState::CreateSigningCommitment {
                    commitment: None,
                    ..
                }
                | CoordinatorState::CreateSignatureShare {
                    share: None,
                    ..
                }
        ),
        CeremonyState::SelectRole => false,
    }
}

async fn get_transaction(
    ceremony: &mut Ceremony,
    prompt: &mut Prompt,
    args: &CeremonyArgs,
) -> Result<bool> {
    if let Some(transaction) = &args.transaction {
        ceremony.set_unsigned_transaction(&args.account, transaction)?;
        return Ok(true);
    }
    if !args.outputs.is_empty() {
        let built = attempt!(
            prompt,
            ceremony.build_unsigned_transaction(
                &args.account,
                &args.outputs,
            )
        );
        return Ok(built.is_some());
    }
    loop {
        let text = prompt.ask("paste the unsigned transaction").await?;
        match ceremony.set_unsigned_transaction(&args.account, &text) {
            Ok(()) => return Ok(true),
            Err(e) => eprintln!("error [{}]: {}", e.code(), e),
        }
    }
}

async fn set_signing_package(
    ceremony: &mut Ceremony,
    prompt: &mut Prompt,
) -> Result<bool> {
    loop {
        let text = prompt.ask("paste the signing package").await?;
        match ceremony.set_signing_package(&text) {
            Ok(()) => return Ok(true),
            Err(e) => eprintln!("error [{}]: {}", e.code(), e),
        }
    }
}

/// Gather the artifacts of the other parties for the current step.
///
/// Returns `false` when the operator asked for a restart.
async fn collect(
    ceremony: &mut Ceremony,
    prompt: &mut Prompt,
    label: &str,
) -> Result<bool> {
    eprintln!(
        "paste one {} per line; 'list', 'remove <n>' or 'done'",
        label
    );
    loop {
        let line = prompt.ask(label).await?;
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => {}
            ["list"] => {
                let drafts = ceremony.drafts();
                for (index, draft) in drafts.iter().enumerate() {
                    eprintln!("{}: {}", index, draft);
                }
            }
            ["remove", index] => match index.parse::<usize>() {
                Ok(index) => {
                    if let Err(e) = ceremony.remove_draft(index) {
                        eprintln!("error [{}]: {}", e.code(), e);
                    }
                }
                Err(_) => eprintln!("not a draft number: {}", index),
            },
            ["restart"] => return Ok(false),
            ["done"] => {
                let result = if ceremony.drafts().is_empty() {
                    ceremony.complete_collection()
                } else {
                    ceremony
                        .submit_drafts()
                        .and_then(|_| ceremony.complete_collection())
                };
                match result {
                    Ok(()) => return Ok(true),
                    Err(e) => match prompt.on_failure(&e).await? {
                        Decision::Retry => {}
                        Decision::Restart => return Ok(false),
                    },
                }
            }
            _ => {
                ceremony.add_draft(&line)?;
            }
        }
    }
}
