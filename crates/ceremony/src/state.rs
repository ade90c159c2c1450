//! Ceremony states.
//!
//! Every state carries exactly the artifacts proven available at
//! that step for that role; participants have no fields for the
//! artifacts of other parties.
use coldsig_device::{
    Identity, SigningPackage, TxHash, UnsignedTransaction,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    BroadcastResult, Collection, CommitmentEnvelope, ShareEnvelope,
};

/// Role in a ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Collects every artifact and assembles the signature.
    Coordinator,
    /// Contributes one key share.
    Participant,
}

/// Step of the ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    /// Step 1.
    SelectRole,
    /// Step 2.
    GetUnsignedTransaction,
    /// Step 3.
    CollectIdentities,
    /// Step 4.
    ReviewTransaction,
    /// Step 5.
    CreateSigningCommitment,
    /// Step 6.
    CreateSigningPackage,
    /// Step 7.
    CreateSignatureShare,
    /// Step 8, coordinator.
    AggregateAndBroadcast,
    /// Terminal.
    Done,
}

impl Step {
    /// Position in the ceremony, both final steps are number 8.
    pub fn number(&self) -> u8 {
        match self {
            Step::SelectRole => 1,
            Step::GetUnsignedTransaction => 2,
            Step::CollectIdentities => 3,
            Step::ReviewTransaction => 4,
            Step::CreateSigningCommitment => 5,
            Step::CreateSigningPackage => 6,
            Step::CreateSignatureShare => 7,
            Step::AggregateAndBroadcast | Step::Done => 8,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::SelectRole => "select role",
            Step::GetUnsignedTransaction => "get unsigned transaction",
            Step::CollectIdentities => "collect identities",
            Step::ReviewTransaction => "review transaction",
            Step::CreateSigningCommitment => {
                "create signing commitment"
            }
            Step::CreateSigningPackage => "create signing package",
            Step::CreateSignatureShare => "create signature share",
            Step::AggregateAndBroadcast => "aggregate and broadcast",
            Step::Done => "done",
        };
        write!(f, "{} ({})", self.number(), name)
    }
}

/// Transaction selected in step 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInput {
    /// Account spending the funds.
    pub account: String,
    /// Transaction to sign.
    pub transaction: UnsignedTransaction,
}

/// States of a participant.
#[derive(Debug, Clone)]
pub enum ParticipantState {
    /// Waiting for the transaction.
    GetUnsignedTransaction,
    /// Waiting for the own identity.
    CollectIdentities {
        /// Selected transaction.
        input: TransactionInput,
    },
    /// Waiting for the operator to approve the transaction.
    ReviewTransaction {
        /// Selected transaction.
        input: TransactionInput,
        /// Own identity, relayed to the coordinator.
        identity: Identity,
    },
    /// Transaction approved, commitment not yet created.
    CreateSigningCommitment {
        /// Selected transaction.
        input: TransactionInput,
        /// Own identity.
        identity: Identity,
        /// Reviewed transaction hash.
        tx_hash: TxHash,
    },
    /// Waiting for the package from the coordinator.
    CreateSigningPackage {
        /// Selected transaction.
        input: TransactionInput,
        /// Own identity.
        identity: Identity,
        /// Reviewed transaction hash.
        tx_hash: TxHash,
        /// Own commitment, relayed to the coordinator.
        commitment: CommitmentEnvelope,
    },
    /// Package received, share not yet created.
    CreateSignatureShare {
        /// Selected transaction.
        input: TransactionInput,
        /// Own identity.
        identity: Identity,
        /// Reviewed transaction hash.
        tx_hash: TxHash,
        /// Package from the coordinator.
        package: SigningPackage,
    },
    /// Share created, relayed to the coordinator.
    Done {
        /// Reviewed transaction hash.
        tx_hash: TxHash,
        /// Own signature share.
        share: ShareEnvelope,
    },
}

/// States of the coordinator.
#[derive(Debug, Clone)]
pub enum CoordinatorState {
    /// Waiting for the transaction.
    GetUnsignedTransaction,
    /// Deriving the own identity and collecting the others.
    CollectIdentities {
        /// Selected transaction.
        input: TransactionInput,
        /// Own identity once derived.
        identity: Option<Identity>,
        /// Identities of the other parties.
        others: Collection<Identity>,
    },
    /// Waiting for the operator to approve the transaction.
    ReviewTransaction {
        /// Selected transaction.
        input: TransactionInput,
        /// Own identity.
        identity: Identity,
        /// Every identity, own first.
        identities: Vec<Identity>,
    },
    /// Creating the own commitment and collecting the others.
    CreateSigningCommitment {
        /// Selected transaction.
        input: TransactionInput,
        /// Own identity.
        identity: Identity,
        /// Every identity, own first.
        identities: Vec<Identity>,
        /// Canonical transaction hash.
        tx_hash: TxHash,
        /// Own commitment once created.
        commitment: Option<CommitmentEnvelope>,
        /// Commitments of the other parties.
        others: Collection<CommitmentEnvelope>,
    },
    /// Every commitment collected.
    CreateSigningPackage {
        /// Selected transaction.
        input: TransactionInput,
        /// Own identity.
        identity: Identity,
        /// Every identity, own first.
        identities: Vec<Identity>,
        /// Canonical transaction hash.
        tx_hash: TxHash,
        /// Every commitment, own first.
        commitments: Vec<CommitmentEnvelope>,
    },
    /// Creating the own share and collecting the others.
    CreateSignatureShare {
        /// Selected transaction.
        input: TransactionInput,
        /// Own identity.
        identity: Identity,
        /// Every identity, own first.
        identities: Vec<Identity>,
        /// Canonical transaction hash.
        tx_hash: TxHash,
        /// Every commitment, own first.
        commitments: Vec<CommitmentEnvelope>,
        /// Package relayed to every participant.
        package: SigningPackage,
        /// Own share once created.
        share: Option<ShareEnvelope>,
        /// Shares of the other parties.
        others: Collection<ShareEnvelope>,
    },
    /// Every share collected.
    AggregateAndBroadcast {
        /// Selected transaction.
        input: TransactionInput,
        /// Every identity, own first.
        identities: Vec<Identity>,
        /// Canonical transaction hash.
        tx_hash: TxHash,
        /// Every commitment, own first.
        commitments: Vec<CommitmentEnvelope>,
        /// Package relayed to every participant.
        package: SigningPackage,
        /// Every share, own first.
        shares: Vec<ShareEnvelope>,
    },
    /// Signature aggregated and submitted.
    Done {
        /// Selected transaction.
        input: TransactionInput,
        /// Canonical transaction hash.
        tx_hash: TxHash,
        /// Package relayed to every participant.
        package: SigningPackage,
        /// Every share, own first.
        shares: Vec<ShareEnvelope>,
        /// Result reported by the node.
        result: BroadcastResult,
    },
}

/// State of a ceremony.
#[derive(Debug, Clone, Default)]
pub enum CeremonyState {
    /// Step 1.
    #[default]
    SelectRole,
    /// Coordinator steps.
    Coordinator(CoordinatorState),
    /// Participant steps.
    Participant(ParticipantState),
}

impl CeremonyState {
    /// Selected role.
    pub fn role(&self) -> Option<Role> {
        match self {
            CeremonyState::SelectRole => None,
            CeremonyState::Coordinator(_) => Some(Role::Coordinator),
            CeremonyState::Participant(_) => Some(Role::Participant),
        }
    }

    /// Current step.
    pub fn step(&self) -> Step {
        match self {
            CeremonyState::SelectRole => Step::SelectRole,
            CeremonyState::Coordinator(state) => match state {
                CoordinatorState::GetUnsignedTransaction => {
                    Step::GetUnsignedTransaction
                }
                CoordinatorState::CollectIdentities { .. } => {
                    Step::CollectIdentities
                }
                CoordinatorState::ReviewTransaction { .. } => {
                    Step::ReviewTransaction
                }
                CoordinatorState::CreateSigningCommitment { .. } => {
                    Step::CreateSigningCommitment
                }
                CoordinatorState::CreateSigningPackage { .. } => {
                    Step::CreateSigningPackage
                }
                CoordinatorState::CreateSignatureShare { .. } => {
                    Step::CreateSignatureShare
                }
                CoordinatorState::AggregateAndBroadcast { .. } => {
                    Step::AggregateAndBroadcast
                }
                CoordinatorState::Done { .. } => Step::Done,
            },
            CeremonyState::Participant(state) => match state {
                ParticipantState::GetUnsignedTransaction => {
                    Step::GetUnsignedTransaction
                }
                ParticipantState::CollectIdentities { .. } => {
                    Step::CollectIdentities
                }
                ParticipantState::ReviewTransaction { .. } => {
                    Step::ReviewTransaction
                }
                ParticipantState::CreateSigningCommitment { .. } => {
                    Step::CreateSigningCommitment
                }
                ParticipantState::CreateSigningPackage { .. } => {
                    Step::CreateSigningPackage
                }
                ParticipantState::CreateSignatureShare { .. } => {
                    Step::CreateSignatureShare
                }
                ParticipantState::Done { .. } => Step::Done,
            },
        }
    }

    /// Artifact this party must relay in the current state.
    ///
    /// Participants relay their identity, commitment and share; the
    /// coordinator relays the signing package.
    pub fn export(&self) -> Option<String> {
        match self {
            CeremonyState::Participant(state) => match state {
                ParticipantState::ReviewTransaction {
                    identity, ..
                } => Some(identity.to_hex()),
                ParticipantState::CreateSigningPackage {
                    commitment, ..
                } => Some(commitment.encode()),
                ParticipantState::Done { share, .. } => {
                    Some(share.encode())
                }
                _ => None,
            },
            CeremonyState::Coordinator(
                CoordinatorState::CreateSignatureShare { package, .. },
            ) => Some(package.to_hex()),
            _ => None,
        }
    }

    /// Transaction selected in step 2.
    pub fn transaction(&self) -> Option<&TransactionInput> {
        match self {
            CeremonyState::SelectRole => None,
            CeremonyState::Coordinator(state) => match state {
                CoordinatorState::GetUnsignedTransaction => None,
                CoordinatorState::CollectIdentities { input, .. }
                | CoordinatorState::ReviewTransaction { input, .. }
                | CoordinatorState::CreateSigningCommitment {
                    input, ..
                }
                | CoordinatorState::CreateSigningPackage { input, .. }
                | CoordinatorState::CreateSignatureShare { input, .. }
                | CoordinatorState::AggregateAndBroadcast { input, .. }
                | CoordinatorState::Done { input, .. } => Some(input),
            },
            CeremonyState::Participant(state) => match state {
                ParticipantState::GetUnsignedTransaction
                | ParticipantState::Done { .. } => None,
                ParticipantState::CollectIdentities { input }
                | ParticipantState::ReviewTransaction { input, .. }
                | ParticipantState::CreateSigningCommitment {
                    input, ..
                }
                | ParticipantState::CreateSigningPackage { input, .. }
                | ParticipantState::CreateSignatureShare {
                    input, ..
                } => Some(input),
            },
        }
    }

    /// Reviewed transaction hash.
    pub fn tx_hash(&self) -> Option<&TxHash> {
        match self {
            CeremonyState::SelectRole => None,
            CeremonyState::Coordinator(state) => match state {
                CoordinatorState::GetUnsignedTransaction
                | CoordinatorState::CollectIdentities { .. }
                | CoordinatorState::ReviewTransaction { .. } => None,
                CoordinatorState::CreateSigningCommitment {
                    tx_hash, ..
                }
                | CoordinatorState::CreateSigningPackage { tx_hash, .. }
                | CoordinatorState::CreateSignatureShare { tx_hash, .. }
                | CoordinatorState::AggregateAndBroadcast {
                    tx_hash, ..
                }
                | CoordinatorState::Done { tx_hash, .. } => {
                    Some(tx_hash)
                }
            },
            CeremonyState::Participant(state) => match state {
                ParticipantState::GetUnsignedTransaction
                | ParticipantState::CollectIdentities { .. }
                | ParticipantState::ReviewTransaction { .. } => None,
                ParticipantState::CreateSigningCommitment {
                    tx_hash, ..
                }
                | ParticipantState::CreateSigningPackage { tx_hash, .. }
                | ParticipantState::CreateSignatureShare { tx_hash, .. }
                | ParticipantState::Done { tx_hash, .. } => {
                    Some(tx_hash)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_numbers() {
        assert_eq!(1, Step::SelectRole.number());
        assert_eq!(8, Step::AggregateAndBroadcast.number());
        assert_eq!(8, Step::Done.number());
        assert!(
            Step::ReviewTransaction < Step::CreateSigningCommitment
        );
        assert_eq!(
            "4 (review transaction)",
            Step::ReviewTransaction.to_string()
        );
    }

    #[test]
    fn default_state_has_no_artifacts() {
        let state = CeremonyState::default();
        assert_eq!(Step::SelectRole, state.step());
        assert!(state.role().is_none());
        assert!(state.export().is_none());
        assert!(state.transaction().is_none());
        assert!(state.tx_hash().is_none());
    }
}
