//! Collaborators consumed by the ceremony.
use async_trait::async_trait;
use coldsig_device::{
    Signature, SigningPackage, Transaction, UnsignedTransaction,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CommitmentEnvelope, ShareEnvelope};

/// Error reported by the node or the account store.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Error returned by the remote service.
    #[error("service error {code}: {message}")]
    Remote {
        /// Error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// Error generated by input/output.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error generated by JSON encoding.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Other failure.
    #[error("{0}")]
    Other(String),
}

/// Output of a transaction built by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    /// Recipient address.
    pub public_address: String,
    /// Amount in the smallest unit.
    pub amount: u64,
    /// Memo attached to the note.
    #[serde(default)]
    pub memo: String,
    /// Asset identifier, the native asset when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
}

/// Result of submitting a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResult {
    /// Transaction hash.
    pub hash: String,
    /// Whether the node accepted the transaction.
    pub accepted: bool,
}

/// Transaction known to the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    /// Transaction hash.
    pub hash: String,
    /// Sending account.
    pub account: String,
    /// Fee paid.
    pub fee: u64,
    /// Outputs created.
    pub outputs: Vec<Output>,
}

/// Node operations used by the ceremony and single key signing.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Build an unsigned transaction spending from an account.
    async fn build_unsigned_transaction(
        &self,
        account: &str,
        outputs: &[Output],
    ) -> Result<UnsignedTransaction, ServiceError>;

    /// Combine the transaction and every commitment.
    async fn create_signing_package(
        &self,
        commitments: &[CommitmentEnvelope],
        transaction: &UnsignedTransaction,
        account: &str,
    ) -> Result<SigningPackage, ServiceError>;

    /// Aggregate the signature shares and optionally broadcast.
    async fn aggregate_signature_shares(
        &self,
        package: &SigningPackage,
        shares: &[ShareEnvelope],
        account: &str,
        broadcast: bool,
    ) -> Result<BroadcastResult, ServiceError>;

    /// Attach a single key signature to a transaction.
    async fn add_signature_to_transaction(
        &self,
        transaction: &UnsignedTransaction,
        signature: &Signature,
    ) -> Result<Transaction, ServiceError>;

    /// Submit a signed transaction.
    async fn submit_transaction(
        &self,
        transaction: &Transaction,
        broadcast: bool,
    ) -> Result<BroadcastResult, ServiceError>;

    /// Fetch a transaction of an account by hash.
    async fn get_transaction(
        &self,
        account: &str,
        hash: &str,
    ) -> Result<Option<TransactionSummary>, ServiceError>;
}

/// Wallet account metadata.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Record that the account with the address signs with a device.
    async fn mark_account_as_hardware_signer(
        &self,
        public_address: &str,
    ) -> Result<(), ServiceError>;
}
