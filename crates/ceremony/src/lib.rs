//! Threshold signing ceremony for parties holding key shares on
//! hardware signing devices.
//!
//! A [Ceremony] walks one party through the signing steps, either
//! as the coordinator that collects every artifact and broadcasts
//! the aggregated signature or as a participant that contributes a
//! single share. Artifacts move between parties as hex text copied
//! by hand, see [CommitmentEnvelope] and [ShareEnvelope].
//!
//! Device access goes through the queue of the `coldsig-device`
//! crate; the node and the wallet account store are consumed
//! through the [NodeRpc] and [AccountStore] traits.
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod ceremony;
mod collect;
mod envelope;
mod error;
mod import;
mod progress;
mod rpc;
mod single;
mod state;

pub use ceremony::Ceremony;
pub use collect::{Collection, Drafts};
pub use envelope::{CommitmentEnvelope, ShareEnvelope, ENVELOPE_VERSION};
pub use error::{Error, Failure};
pub use import::import_hardware_account;
pub use progress::{require_ready, Progress};
pub use rpc::{
    AccountStore, BroadcastResult, NodeRpc, Output, ServiceError,
    TransactionSummary,
};
pub use single::SingleKeySigner;
pub use state::{
    CeremonyState, CoordinatorState, ParticipantState, Role, Step,
    TransactionInput,
};

pub use coldsig_device::{
    Identity, Signature, SignatureShare, SigningCommitment,
    SigningPackage, Transaction, TxHash, UnsignedTransaction,
};

/// Result type for the ceremony library.
pub type Result<T> = std::result::Result<T, Error>;
