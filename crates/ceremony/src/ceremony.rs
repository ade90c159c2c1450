//! Threshold signing ceremony driver.
//!
//! Each public action either advances the state along the step
//! table or fails leaving the state untouched. Invoking the failed
//! action again is the retry. Actions that need the device check it
//! first and fail with [Error::DeviceNotReady] unless it is ready.
use coldsig_device::{
    ConnectionMonitor, DeviceSigner, Identity, SigningPackage,
    UnsignedTransaction,
};
use std::sync::Arc;
use tokio::sync::watch;

use crate::{
    progress::{require_ready, Reporter},
    BroadcastResult, CeremonyState, CommitmentEnvelope,
    CoordinatorState, Drafts, Error, Failure, NodeRpc, Output,
    ParticipantState, Progress, Result, Role, ShareEnvelope, Step,
    TransactionInput,
};

/// Drives one ceremony for the local party.
///
/// Only one ceremony should exist per device since every device step
/// goes through the same operation queue.
pub struct Ceremony {
    signer: DeviceSigner,
    monitor: ConnectionMonitor,
    rpc: Arc<dyn NodeRpc>,
    state: CeremonyState,
    last_failure: Option<Failure>,
    progress: Reporter,
}

impl Ceremony {
    /// Create a ceremony in the select role step.
    pub fn new(
        signer: DeviceSigner,
        monitor: ConnectionMonitor,
        rpc: Arc<dyn NodeRpc>,
    ) -> Self {
        Self {
            signer,
            monitor,
            rpc,
            state: CeremonyState::SelectRole,
            last_failure: None,
            progress: Reporter::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> &CeremonyState {
        &self.state
    }

    /// Current step.
    pub fn step(&self) -> Step {
        self.state.step()
    }

    /// Selected role.
    pub fn role(&self) -> Option<Role> {
        self.state.role()
    }

    /// Artifact to relay to the other parties.
    pub fn export(&self) -> Option<String> {
        self.state.export()
    }

    /// Failure of the most recent action, cleared by a success.
    pub fn last_failure(&self) -> Option<&Failure> {
        self.last_failure.as_ref()
    }

    /// Progress of the running action.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Discard every artifact and return to role selection.
    pub fn restart(&mut self) {
        tracing::info!(step = %self.step(), "ceremony restarted");
        self.state = CeremonyState::SelectRole;
        self.last_failure = None;
    }

    /// Step 1: choose the role.
    pub fn select_role(&mut self, role: Role) -> Result<()> {
        let selecting = matches!(self.state, CeremonyState::SelectRole);
        let result = if selecting {
            self.advance(match role {
                Role::Coordinator => CeremonyState::Coordinator(
                    CoordinatorState::GetUnsignedTransaction,
                ),
                Role::Participant => CeremonyState::Participant(
                    ParticipantState::GetUnsignedTransaction,
                ),
            });
            Ok(())
        } else {
            Err(self.invalid_step("select role"))
        };
        self.settle("select role", result)
    }

    /// Step 2: use a pasted unsigned transaction.
    pub fn set_unsigned_transaction(
        &mut self,
        account: &str,
        transaction: &str,
    ) -> Result<()> {
        let result =
            self.set_unsigned_transaction_inner(account, transaction);
        self.settle("set unsigned transaction", result)
    }

    fn set_unsigned_transaction_inner(
        &mut self,
        account: &str,
        transaction: &str,
    ) -> Result<()> {
        self.expect_transaction_step("set unsigned transaction")?;
        let transaction: UnsignedTransaction = transaction.parse()?;
        self.accept_transaction(account, transaction)
    }

    /// Step 2: build the unsigned transaction through the node.
    pub async fn build_unsigned_transaction(
        &mut self,
        account: &str,
        outputs: &[Output],
    ) -> Result<UnsignedTransaction> {
        let result = self
            .build_unsigned_transaction_inner(account, outputs)
            .await;
        self.settle("build unsigned transaction", result)
    }

    async fn build_unsigned_transaction_inner(
        &mut self,
        account: &str,
        outputs: &[Output],
    ) -> Result<UnsignedTransaction> {
        self.expect_transaction_step("build unsigned transaction")?;
        if outputs.is_empty() {
            return Err(Error::invalid("outputs", "no outputs"));
        }

        let transaction = {
            let _progress = self.progress.begin(Progress::AwaitingNode);
            self.rpc
                .build_unsigned_transaction(account, outputs)
                .await
                .map_err(|source| Error::Step {
                    step: "build unsigned transaction",
                    source,
                })?
        };
        self.accept_transaction(account, transaction.clone())?;
        Ok(transaction)
    }

    /// Step 3: derive the own identity on the device.
    ///
    /// A participant advances to the review, the coordinator stays
    /// to collect the identities of the other parties.
    pub async fn derive_identity(
        &mut self,
        index: u8,
    ) -> Result<Identity> {
        let result = self.derive_identity_inner(index).await;
        self.settle("derive identity", result)
    }

    async fn derive_identity_inner(
        &mut self,
        index: u8,
    ) -> Result<Identity> {
        const ACTION: &str = "derive identity";
        if self.step() != Step::CollectIdentities {
            return Err(self.invalid_step(ACTION));
        }

        let identity = self.device_call(false, |signer| async move {
            signer.derive_identity(index).await
        })
        .await?;

        match &mut self.state {
            CeremonyState::Coordinator(
                CoordinatorState::CollectIdentities {
                    identity: own,
                    others,
                    ..
                },
            ) => {
                if others.submitted().contains(&identity) {
                    return Err(Error::invalid(
                        "identity",
                        "own identity was collected from another party",
                    ));
                }
                *own = Some(identity.clone());
                tracing::info!(
                    identity = ?identity,
                    "own identity derived"
                );
            }
            CeremonyState::Participant(
                ParticipantState::CollectIdentities { input },
            ) => {
                let next = ParticipantState::ReviewTransaction {
                    input: input.clone(),
                    identity: identity.clone(),
                };
                self.advance(CeremonyState::Participant(next));
            }
            _ => return Err(self.invalid_step(ACTION)),
        }
        Ok(identity)
    }

    /// Pending drafts of the collection in the current step.
    ///
    /// Empty unless the coordinator is collecting identities,
    /// commitments or signature shares.
    pub fn drafts(&self) -> &[String] {
        match &self.state {
            CeremonyState::Coordinator(state) => match state {
                CoordinatorState::CollectIdentities { others, .. } => {
                    others.drafts().entries()
                }
                CoordinatorState::CreateSigningCommitment {
                    others, ..
                } => others.drafts().entries(),
                CoordinatorState::CreateSignatureShare {
                    others, ..
                } => others.drafts().entries(),
                _ => &[],
            },
            _ => &[],
        }
    }

    /// Add a pasted artifact of another party as a draft.
    pub fn add_draft(&mut self, text: &str) -> Result<usize> {
        let result = self.drafts_mut("add draft").map(|d| d.add(text));
        self.settle("add draft", result)
    }

    /// Replace the text of a draft.
    pub fn edit_draft(
        &mut self,
        index: usize,
        text: &str,
    ) -> Result<()> {
        let result = self
            .drafts_mut("edit draft")
            .and_then(|d| d.edit(index, text));
        self.settle("edit draft", result)
    }

    /// Remove a draft.
    pub fn remove_draft(&mut self, index: usize) -> Result<String> {
        let result = self
            .drafts_mut("remove draft")
            .and_then(|d| d.remove(index));
        self.settle("remove draft", result)
    }

    /// Validate every draft and append them to the collection.
    ///
    /// Either every draft is accepted or none is.
    pub fn submit_drafts(&mut self) -> Result<usize> {
        let result = self.submit_drafts_inner();
        self.settle("submit drafts", result)
    }

    fn submit_drafts_inner(&mut self) -> Result<usize> {
        let step = self.step();
        let count = match &mut self.state {
            CeremonyState::Coordinator(
                CoordinatorState::CollectIdentities {
                    identity: own,
                    others,
                    ..
                },
            ) => {
                let own = own.as_ref();
                others.submit_with(|text, accepted| {
                    let identity: Identity = text.parse()?;
                    if own == Some(&identity)
                        || accepted.contains(&identity)
                    {
                        return Err(Error::invalid(
                            "identity",
                            "duplicate identity",
                        ));
                    }
                    Ok(identity)
                })?
            }
            CeremonyState::Coordinator(
                CoordinatorState::CreateSigningCommitment {
                    identity: own,
                    identities,
                    tx_hash,
                    others,
                    ..
                },
            ) => {
                let (own, identities, tx_hash) =
                    (&*own, &*identities, &*tx_hash);
                others.submit_with(|text, accepted| {
                    let envelope = CommitmentEnvelope::decode(text)?;
                    check_sender(
                        "signing commitment",
                        &envelope.identity,
                        own,
                        identities,
                        accepted.iter().map(|c| &c.identity),
                    )?;
                    if &envelope.tx_hash != tx_hash {
                        tracing::warn!(
                            identity = ?envelope.identity,
                            "party reviewed a different transaction"
                        );
                        return Err(Error::TxHashMismatch {
                            expected: tx_hash.clone(),
                            actual: envelope.tx_hash,
                        });
                    }
                    Ok(envelope)
                })?
            }
            CeremonyState::Coordinator(
                CoordinatorState::CreateSignatureShare {
                    identity: own,
                    identities,
                    others,
                    ..
                },
            ) => {
                let (own, identities) = (&*own, &*identities);
                others.submit_with(|text, accepted| {
                    let envelope = ShareEnvelope::decode(text)?;
                    check_sender(
                        "signature share",
                        &envelope.identity,
                        own,
                        identities,
                        accepted.iter().map(|s| &s.identity),
                    )?;
                    Ok(envelope)
                })?
            }
            _ => {
                return Err(Error::InvalidStep {
                    action: "submit drafts",
                    step,
                })
            }
        };
        tracing::info!(step = %step, count, "drafts submitted");
        Ok(count)
    }

    /// Close the collection of the current step and advance.
    ///
    /// Identities need at least one other party; commitments and
    /// shares need one entry for every identity.
    pub fn complete_collection(&mut self) -> Result<()> {
        let result = self.complete_collection_inner();
        self.settle("complete collection", result)
    }

    fn complete_collection_inner(&mut self) -> Result<()> {
        const ACTION: &str = "complete collection";
        let CeremonyState::Coordinator(state) = &self.state else {
            return Err(self.invalid_step(ACTION));
        };

        let next = match state {
            CoordinatorState::CollectIdentities {
                input,
                identity,
                others,
            } => {
                let identity = identity.as_ref().ok_or_else(|| {
                    Error::invalid(
                        "identity",
                        "own identity not derived",
                    )
                })?;
                require_no_drafts(others.drafts())?;
                if others.submitted().is_empty() {
                    return Err(Error::invalid(
                        "identities",
                        "at least one other party is required",
                    ));
                }
                let mut identities = vec![identity.clone()];
                identities.extend_from_slice(others.submitted());
                CoordinatorState::ReviewTransaction {
                    input: input.clone(),
                    identity: identity.clone(),
                    identities,
                }
            }
            CoordinatorState::CreateSigningCommitment {
                input,
                identity,
                identities,
                tx_hash,
                commitment,
                others,
            } => {
                let commitment = commitment.as_ref().ok_or_else(|| {
                    Error::invalid(
                        "signing commitment",
                        "own commitment not created",
                    )
                })?;
                require_no_drafts(others.drafts())?;
                require_all(
                    "signing commitments",
                    identities.len(),
                    others.submitted().len(),
                )?;
                let mut commitments = vec![commitment.clone()];
                commitments.extend_from_slice(others.submitted());
                CoordinatorState::CreateSigningPackage {
                    input: input.clone(),
                    identity: identity.clone(),
                    identities: identities.clone(),
                    tx_hash: tx_hash.clone(),
                    commitments,
                }
            }
            CoordinatorState::CreateSignatureShare {
                input,
                identities,
                tx_hash,
                commitments,
                package,
                share,
                others,
                ..
            } => {
                let share = share.as_ref().ok_or_else(|| {
                    Error::invalid(
                        "signature share",
                        "own share not created",
                    )
                })?;
                require_no_drafts(others.drafts())?;
                require_all(
                    "signature shares",
                    identities.len(),
                    others.submitted().len(),
                )?;
                let mut shares = vec![share.clone()];
                shares.extend_from_slice(others.submitted());
                CoordinatorState::AggregateAndBroadcast {
                    input: input.clone(),
                    identities: identities.clone(),
                    tx_hash: tx_hash.clone(),
                    commitments: commitments.clone(),
                    package: package.clone(),
                    shares,
                }
            }
            _ => return Err(self.invalid_step(ACTION)),
        };

        self.advance(CeremonyState::Coordinator(next));
        Ok(())
    }

    /// Step 4: show the transaction on the device for approval.
    pub async fn review_transaction(&mut self) -> Result<()> {
        let result = self.review_transaction_inner().await;
        self.settle("review transaction", result)
    }

    async fn review_transaction_inner(&mut self) -> Result<()> {
        const ACTION: &str = "review transaction";
        let transaction = match self.state.transaction() {
            Some(input) if self.step() == Step::ReviewTransaction => {
                input.transaction.clone()
            }
            _ => return Err(self.invalid_step(ACTION)),
        };

        let tx_hash = self
            .device_call(true, |signer| async move {
                signer.review_transaction(&transaction).await
            })
            .await?;

        let next = match &self.state {
            CeremonyState::Coordinator(
                CoordinatorState::ReviewTransaction {
                    input,
                    identity,
                    identities,
                },
            ) => CeremonyState::Coordinator(
                CoordinatorState::CreateSigningCommitment {
                    input: input.clone(),
                    identity: identity.clone(),
                    identities: identities.clone(),
                    tx_hash,
                    commitment: None,
                    others: Default::default(),
                },
            ),
            CeremonyState::Participant(
                ParticipantState::ReviewTransaction { input, identity },
            ) => CeremonyState::Participant(
                ParticipantState::CreateSigningCommitment {
                    input: input.clone(),
                    identity: identity.clone(),
                    tx_hash,
                },
            ),
            _ => return Err(self.invalid_step(ACTION)),
        };
        self.advance(next);
        Ok(())
    }

    /// Step 5: create the own signing commitment.
    ///
    /// A participant advances to wait for the signing package, the
    /// coordinator stays to collect the other commitments.
    pub async fn create_signing_commitment(
        &mut self,
    ) -> Result<CommitmentEnvelope> {
        let result = self.create_signing_commitment_inner().await;
        self.settle("create signing commitment", result)
    }

    async fn create_signing_commitment_inner(
        &mut self,
    ) -> Result<CommitmentEnvelope> {
        const ACTION: &str = "create signing commitment";
        let (identity, tx_hash) = match &self.state {
            CeremonyState::Coordinator(
                CoordinatorState::CreateSigningCommitment {
                    identity,
                    tx_hash,
                    commitment: None,
                    ..
                },
            )
            | CeremonyState::Participant(
                ParticipantState::CreateSigningCommitment {
                    identity,
                    tx_hash,
                    ..
                },
            ) => (identity.clone(), tx_hash.clone()),
            _ => return Err(self.invalid_step(ACTION)),
        };

        let commitment = {
            let tx_hash = tx_hash.clone();
            self.device_call(false, |signer| async move {
                signer.get_signing_commitment(&tx_hash).await
            })
            .await?
        };
        let envelope = CommitmentEnvelope {
            identity,
            tx_hash,
            commitment,
        };

        match &mut self.state {
            CeremonyState::Coordinator(
                CoordinatorState::CreateSigningCommitment {
                    commitment, ..
                },
            ) => {
                *commitment = Some(envelope.clone());
                tracing::info!("own signing commitment created");
            }
            CeremonyState::Participant(
                ParticipantState::CreateSigningCommitment {
                    input,
                    identity,
                    tx_hash,
                },
            ) => {
                let next = ParticipantState::CreateSigningPackage {
                    input: input.clone(),
                    identity: identity.clone(),
                    tx_hash: tx_hash.clone(),
                    commitment: envelope.clone(),
                };
                self.advance(CeremonyState::Participant(next));
            }
            _ => return Err(self.invalid_step(ACTION)),
        }
        Ok(envelope)
    }

    /// Step 6: build the signing package through the node.
    pub async fn create_signing_package(
        &mut self,
    ) -> Result<SigningPackage> {
        let result = self.create_signing_package_inner().await;
        self.settle("create signing package", result)
    }

    async fn create_signing_package_inner(
        &mut self,
    ) -> Result<SigningPackage> {
        const ACTION: &str = "create signing package";
        let CeremonyState::Coordinator(
            CoordinatorState::CreateSigningPackage {
                input, commitments, ..
            },
        ) = &self.state
        else {
            return Err(self.invalid_step(ACTION));
        };

        let package = {
            let _progress = self.progress.begin(Progress::AwaitingNode);
            self.rpc
                .create_signing_package(
                    commitments,
                    &input.transaction,
                    &input.account,
                )
                .await
                .map_err(|source| Error::Step {
                    step: ACTION,
                    source,
                })?
        };

        let next = match &self.state {
            CeremonyState::Coordinator(
                CoordinatorState::CreateSigningPackage {
                    input,
                    identity,
                    identities,
                    tx_hash,
                    commitments,
                },
            ) => CoordinatorState::CreateSignatureShare {
                input: input.clone(),
                identity: identity.clone(),
                identities: identities.clone(),
                tx_hash: tx_hash.clone(),
                commitments: commitments.clone(),
                package: package.clone(),
                share: None,
                others: Default::default(),
            },
            _ => return Err(self.invalid_step(ACTION)),
        };
        self.advance(CeremonyState::Coordinator(next));
        Ok(package)
    }

    /// Step 6: use the signing package received from the coordinator.
    pub fn set_signing_package(&mut self, package: &str) -> Result<()> {
        let result = self.set_signing_package_inner(package);
        self.settle("set signing package", result)
    }

    fn set_signing_package_inner(
        &mut self,
        package: &str,
    ) -> Result<()> {
        let next = match &self.state {
            CeremonyState::Participant(
                ParticipantState::CreateSigningPackage {
                    input,
                    identity,
                    tx_hash,
                    ..
                },
            ) => ParticipantState::CreateSignatureShare {
                input: input.clone(),
                identity: identity.clone(),
                tx_hash: tx_hash.clone(),
                package: package.parse()?,
            },
            _ => return Err(self.invalid_step("set signing package")),
        };
        self.advance(CeremonyState::Participant(next));
        Ok(())
    }

    /// Step 7: create the own signature share.
    ///
    /// A participant is done afterwards, the coordinator stays to
    /// collect the other shares.
    pub async fn create_signature_share(
        &mut self,
    ) -> Result<ShareEnvelope> {
        let result = self.create_signature_share_inner().await;
        self.settle("create signature share", result)
    }

    async fn create_signature_share_inner(
        &mut self,
    ) -> Result<ShareEnvelope> {
        const ACTION: &str = "create signature share";
        let (identity, package) = match &self.state {
            CeremonyState::Coordinator(
                CoordinatorState::CreateSignatureShare {
                    identity,
                    package,
                    share: None,
                    ..
                },
            )
            | CeremonyState::Participant(
                ParticipantState::CreateSignatureShare {
                    identity,
                    package,
                    ..
                },
            ) => (identity.clone(), package.clone()),
            _ => return Err(self.invalid_step(ACTION)),
        };

        let share = {
            let identity = identity.clone();
            self.device_call(false, |signer| async move {
                signer.create_signature_share(&package, &identity).await
            })
            .await?
        };
        let envelope = ShareEnvelope { identity, share };

        match &mut self.state {
            CeremonyState::Coordinator(
                CoordinatorState::CreateSignatureShare { share, .. },
            ) => {
                *share = Some(envelope.clone());
                tracing::info!("own signature share created");
            }
            CeremonyState::Participant(
                ParticipantState::CreateSignatureShare { tx_hash, .. },
            ) => {
                let next = ParticipantState::Done {
                    tx_hash: tx_hash.clone(),
                    share: envelope.clone(),
                };
                self.advance(CeremonyState::Participant(next));
            }
            _ => return Err(self.invalid_step(ACTION)),
        }
        Ok(envelope)
    }

    /// Step 8: aggregate the shares and optionally broadcast.
    ///
    /// A failure leaves the outcome unknown: the transaction may have
    /// reached the network. The action is not retried.
    pub async fn aggregate_and_broadcast(
        &mut self,
        broadcast: bool,
    ) -> Result<BroadcastResult> {
        let result =
            self.aggregate_and_broadcast_inner(broadcast).await;
        self.settle("aggregate and broadcast", result)
    }

    async fn aggregate_and_broadcast_inner(
        &mut self,
        broadcast: bool,
    ) -> Result<BroadcastResult> {
        const ACTION: &str = "aggregate and broadcast";
        let CeremonyState::Coordinator(
            CoordinatorState::AggregateAndBroadcast {
                input,
                package,
                shares,
                ..
            },
        ) = &self.state
        else {
            return Err(self.invalid_step(ACTION));
        };

        let result = {
            let _progress = self.progress.begin(Progress::AwaitingNode);
            self.rpc
                .aggregate_signature_shares(
                    package,
                    shares,
                    &input.account,
                    broadcast,
                )
                .await
                .map_err(Error::BroadcastOutcomeUnknown)?
        };
        tracing::info!(
            hash = %result.hash,
            accepted = result.accepted,
            "signature aggregated"
        );

        let next = match &self.state {
            CeremonyState::Coordinator(
                CoordinatorState::AggregateAndBroadcast {
                    input,
                    tx_hash,
                    package,
                    shares,
                    ..
                },
            ) => CoordinatorState::Done {
                input: input.clone(),
                tx_hash: tx_hash.clone(),
                package: package.clone(),
                shares: shares.clone(),
                result: result.clone(),
            },
            _ => return Err(self.invalid_step(ACTION)),
        };
        self.advance(CeremonyState::Coordinator(next));
        Ok(result)
    }

    fn expect_transaction_step(
        &self,
        action: &'static str,
    ) -> Result<()> {
        if self.step() == Step::GetUnsignedTransaction {
            Ok(())
        } else {
            Err(self.invalid_step(action))
        }
    }

    fn accept_transaction(
        &mut self,
        account: &str,
        transaction: UnsignedTransaction,
    ) -> Result<()> {
        let account = account.trim();
        if account.is_empty() {
            return Err(Error::invalid("account", "empty"));
        }
        let input = TransactionInput {
            account: account.to_string(),
            transaction,
        };
        let next = match self.role() {
            Some(Role::Coordinator) => CeremonyState::Coordinator(
                CoordinatorState::CollectIdentities {
                    input,
                    identity: None,
                    others: Default::default(),
                },
            ),
            Some(Role::Participant) => CeremonyState::Participant(
                ParticipantState::CollectIdentities { input },
            ),
            None => {
                let action = "set unsigned transaction";
                return Err(self.invalid_step(action));
            }
        };
        self.advance(next);
        Ok(())
    }

    /// Run a device operation once the device is ready.
    async fn device_call<F, Fut, T>(
        &self,
        approval: bool,
        call: F,
    ) -> Result<T>
    where
        F: FnOnce(DeviceSigner) -> Fut,
        Fut: std::future::Future<Output = coldsig_device::Result<T>>,
    {
        require_ready(&self.monitor).await?;
        let _progress =
            self.progress.begin(Progress::AwaitingDevice { approval });
        Ok(call(self.signer.clone()).await?)
    }

    fn drafts_mut(
        &mut self,
        action: &'static str,
    ) -> Result<&mut Drafts> {
        let step = self.step();
        match &mut self.state {
            CeremonyState::Coordinator(
                CoordinatorState::CollectIdentities { others, .. },
            ) => Ok(others.drafts_mut()),
            CeremonyState::Coordinator(
                CoordinatorState::CreateSigningCommitment {
                    others,
                    ..
                },
            ) => Ok(others.drafts_mut()),
            CeremonyState::Coordinator(
                CoordinatorState::CreateSignatureShare { others, .. },
            ) => Ok(others.drafts_mut()),
            _ => Err(Error::InvalidStep { action, step }),
        }
    }

    fn advance(&mut self, next: CeremonyState) {
        tracing::info!(
            from = %self.state.step(),
            to = %next.step(),
            role = ?next.role(),
            "ceremony advanced"
        );
        self.state = next;
    }

    fn invalid_step(&self, action: &'static str) -> Error {
        Error::InvalidStep {
            action,
            step: self.step(),
        }
    }

    fn settle<T>(
        &mut self,
        action: &'static str,
        result: Result<T>,
    ) -> Result<T> {
        match &result {
            Ok(_) => self.last_failure = None,
            Err(e) => {
                tracing::warn!(
                    action,
                    code = e.code(),
                    error = %e,
                    "ceremony action failed"
                );
                self.last_failure = Some(Failure::new(action, e));
            }
        }
        result
    }
}

fn check_sender<'a>(
    label: &'static str,
    sender: &Identity,
    own: &Identity,
    identities: &[Identity],
    accepted: impl IntoIterator<Item = &'a Identity>,
) -> Result<()> {
    if sender == own {
        return Err(Error::invalid(label, "own artifact pasted"));
    }
    if !identities.contains(sender) {
        return Err(Error::invalid(label, "unknown identity"));
    }
    if accepted.into_iter().any(|i| i == sender) {
        return Err(Error::invalid(label, "duplicate identity"));
    }
    Ok(())
}

fn require_no_drafts(drafts: &Drafts) -> Result<()> {
    if drafts.is_empty() {
        Ok(())
    } else {
        Err(Error::invalid("drafts", "submit or remove pending drafts"))
    }
}

fn require_all(
    label: &'static str,
    parties: usize,
    others: usize,
) -> Result<()> {
    let collected = others + 1;
    if collected == parties {
        Ok(())
    } else {
        Err(Error::invalid(
            label,
            format!("collected {collected} of {parties}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ServiceError, TransactionSummary};
    use anyhow::Result;
    use async_trait::async_trait;
    use coldsig_device::{
        emulator::{DeviceEmulator, Presence},
        DeviceQueue, DeviceState, MonitorOptions, Signature,
        Transaction,
    };

    struct NoNode;

    #[async_trait]
    impl NodeRpc for NoNode {
        async fn build_unsigned_transaction(
            &self,
            _account: &str,
            _outputs: &[Output],
        ) -> std::result::Result<UnsignedTransaction, ServiceError> {
            Err(ServiceError::Other("offline".to_string()))
        }

        async fn create_signing_package(
            &self,
            commitments: &[CommitmentEnvelope],
            _transaction: &UnsignedTransaction,
            _account: &str,
        ) -> std::result::Result<SigningPackage, ServiceError> {
            let bytes = commitments
                .iter()
                .flat_map(|c| c.commitment.as_bytes().to_vec())
                .collect();
            SigningPackage::from_bytes(bytes)
                .map_err(|e| ServiceError::Other(e.to_string()))
        }

        async fn aggregate_signature_shares(
            &self,
            _package: &SigningPackage,
            _shares: &[ShareEnvelope],
            _account: &str,
            _broadcast: bool,
        ) -> std::result::Result<BroadcastResult, ServiceError> {
            Err(ServiceError::Other("connection reset".to_string()))
        }

        async fn add_signature_to_transaction(
            &self,
            _transaction: &UnsignedTransaction,
            _signature: &Signature,
        ) -> std::result::Result<Transaction, ServiceError> {
            Err(ServiceError::Other("offline".to_string()))
        }

        async fn submit_transaction(
            &self,
            _transaction: &Transaction,
            _broadcast: bool,
        ) -> std::result::Result<BroadcastResult, ServiceError> {
            Err(ServiceError::Other("offline".to_string()))
        }

        async fn get_transaction(
            &self,
            _account: &str,
            _hash: &str,
        ) -> std::result::Result<
            Option<TransactionSummary>,
            ServiceError,
        > {
            Ok(None)
        }
    }

    fn ceremony(emulator: &DeviceEmulator) -> Result<Ceremony> {
        let queue = DeviceQueue::spawn(emulator.connector())?;
        let monitor = ConnectionMonitor::new(
            queue.clone(),
            MonitorOptions::default(),
        )?;
        Ok(Ceremony::new(
            DeviceSigner::new(queue, 0),
            monitor,
            Arc::new(NoNode),
        ))
    }

    fn transaction_hex(byte: u8) -> String {
        hex::encode(vec![byte; 300])
    }

    #[tokio::test]
    async fn actions_outside_their_step_are_rejected() -> Result<()> {
        let emulator = DeviceEmulator::new([1u8; 32]);
        let mut ceremony = ceremony(&emulator)?;

        let err = match ceremony.review_transaction().await {
            Err(e) => e,
            Ok(_) => anyhow::bail!("review before role selection"),
        };
        assert_eq!("INVALID_STEP", err.code());
        assert_eq!(Step::SelectRole, ceremony.step());
        assert_eq!(
            Some("review transaction"),
            ceremony.last_failure().map(|f| f.action)
        );
        assert_eq!(0, emulator.exchanges());

        ceremony.select_role(Role::Participant)?;
        assert!(ceremony.last_failure().is_none());
        assert!(ceremony.select_role(Role::Coordinator).is_err());
        assert!(ceremony.add_draft("00").is_err());
        assert!(ceremony.set_signing_package("00").is_err());
        assert_eq!(Step::GetUnsignedTransaction, ceremony.step());
        Ok(())
    }

    #[tokio::test]
    async fn device_steps_require_a_ready_device() -> Result<()> {
        let emulator = DeviceEmulator::new([1u8; 32]);
        let mut ceremony = ceremony(&emulator)?;
        ceremony.select_role(Role::Participant)?;
        ceremony
            .set_unsigned_transaction("multisig", &transaction_hex(1))?;

        emulator.set_presence(Presence::Locked);
        let err = match ceremony.derive_identity(0).await {
            Err(e) => e,
            Ok(_) => {
                anyhow::bail!("derived identity on a locked device")
            }
        };
        assert!(matches!(
            err,
            Error::DeviceNotReady(DeviceState::Locked)
        ));
        assert_eq!(Step::CollectIdentities, ceremony.step());
        assert_eq!(
            Some("DEVICE_NOT_READY"),
            ceremony.last_failure().map(|f| f.code)
        );

        // retry once the operator unlocks the device
        emulator.set_presence(Presence::AppOpen);
        let identity = ceremony.derive_identity(0).await?;
        assert_eq!(emulator.identity(0)?, identity);
        assert_eq!(Step::ReviewTransaction, ceremony.step());
        assert_eq!(Some(identity.to_hex()), ceremony.export());
        assert_eq!(Progress::Idle, *ceremony.progress().borrow());
        Ok(())
    }

    #[tokio::test]
    async fn participant_cannot_resume_after_restart() -> Result<()> {
        let emulator = DeviceEmulator::new([2u8; 32]);
        let mut ceremony = ceremony(&emulator)?;
        ceremony.select_role(Role::Participant)?;
        ceremony
            .set_unsigned_transaction("multisig", &transaction_hex(2))?;
        ceremony.derive_identity(0).await?;
        ceremony.review_transaction().await?;
        let commitment = ceremony.create_signing_commitment().await?;
        assert_eq!(Some(commitment.encode()), ceremony.export());

        assert!(ceremony.set_signing_package("not hex").is_err());
        assert_eq!(Step::CreateSigningPackage, ceremony.step());
        ceremony.set_signing_package(&hex::encode([5u8; 64]))?;
        let share = ceremony.create_signature_share().await?;
        assert_eq!(Step::Done, ceremony.step());
        assert_eq!(Some(share.encode()), ceremony.export());

        ceremony.restart();
        assert_eq!(Step::SelectRole, ceremony.step());
        assert!(ceremony.state().transaction().is_none());
        assert!(ceremony.create_signature_share().await.is_err());

        ceremony.select_role(Role::Participant)?;
        assert_eq!(Step::GetUnsignedTransaction, ceremony.step());
        assert!(ceremony.create_signature_share().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn coordinator_rejects_foreign_tx_hash() -> Result<()> {
        let coordinator_device = DeviceEmulator::new([3u8; 32]);
        let participant_device = DeviceEmulator::new([4u8; 32]);
        let mut coordinator = ceremony(&coordinator_device)?;
        let mut participant = ceremony(&participant_device)?;

        coordinator.select_role(Role::Coordinator)?;
        coordinator
            .set_unsigned_transaction("multisig", &transaction_hex(3))?;
        participant.select_role(Role::Participant)?;
        // careless participant pastes another transaction
        participant
            .set_unsigned_transaction("multisig", &transaction_hex(9))?;

        coordinator.derive_identity(0).await?;
        let identity = participant.derive_identity(1).await?;

        assert!(coordinator.complete_collection().is_err());
        coordinator.add_draft(&identity.to_hex())?;
        coordinator.add_draft(&identity.to_hex())?;
        assert!(coordinator.submit_drafts().is_err());
        coordinator.remove_draft(1)?;
        assert_eq!(1, coordinator.submit_drafts()?);
        coordinator.complete_collection()?;

        coordinator.review_transaction().await?;
        participant.review_transaction().await?;
        coordinator.create_signing_commitment().await?;
        let commitment = participant.create_signing_commitment().await?;

        coordinator.add_draft(&commitment.encode())?;
        let err = match coordinator.submit_drafts() {
            Err(e) => e,
            Ok(_) => {
                anyhow::bail!("accepted a commitment for another tx")
            }
        };
        assert_eq!("TX_HASH_MISMATCH", err.code());
        assert!(!err.retryable());
        assert_eq!(Step::CreateSigningCommitment, coordinator.step());
        assert!(coordinator.complete_collection().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn broadcast_failure_is_ambiguous() -> Result<()> {
        let coordinator_device = DeviceEmulator::new([5u8; 32]);
        let participant_device = DeviceEmulator::new([6u8; 32]);
        let mut coordinator = ceremony(&coordinator_device)?;
        let mut participant = ceremony(&participant_device)?;
        let transaction = transaction_hex(7);

        coordinator.select_role(Role::Coordinator)?;
        coordinator.set_unsigned_transaction("multisig", &transaction)?;
        participant.select_role(Role::Participant)?;
        participant.set_unsigned_transaction("multisig", &transaction)?;

        coordinator.derive_identity(0).await?;
        let identity = participant.derive_identity(0).await?;
        coordinator.add_draft(&identity.to_hex())?;
        coordinator.submit_drafts()?;
        coordinator.complete_collection()?;

        coordinator.review_transaction().await?;
        participant.review_transaction().await?;
        coordinator.create_signing_commitment().await?;
        let commitment = participant.create_signing_commitment().await?;
        coordinator.add_draft(&commitment.encode())?;
        coordinator.submit_drafts()?;
        coordinator.complete_collection()?;

        coordinator.create_signing_package().await?;
        let package = coordinator.export().unwrap_or_default();
        participant.set_signing_package(&package)?;
        coordinator.create_signature_share().await?;
        let share = participant.create_signature_share().await?;
        coordinator.add_draft(&share.encode())?;
        coordinator.submit_drafts()?;
        coordinator.complete_collection()?;
        assert_eq!(Step::AggregateAndBroadcast, coordinator.step());

        let result = coordinator.aggregate_and_broadcast(true).await;
        let err = match result {
            Err(e) => e,
            Ok(_) => anyhow::bail!("offline node broadcast"),
        };
        assert_eq!("BROADCAST_OUTCOME_UNKNOWN", err.code());
        assert_eq!(Step::AggregateAndBroadcast, coordinator.step());
        assert_eq!(
            Some(false),
            coordinator.last_failure().map(|f| f.retryable)
        );
        Ok(())
    }
}
