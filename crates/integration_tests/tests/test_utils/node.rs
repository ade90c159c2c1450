use async_trait::async_trait;
use coldsig_ceremony::{
    BroadcastResult, CommitmentEnvelope, NodeRpc, Output, ServiceError,
    ShareEnvelope, TransactionSummary,
};
use coldsig_device::{
    emulator::DeviceEmulator, DecodeError, Signature, SigningPackage,
    Transaction, TxHash, UnsignedTransaction,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Mutex};

/// Fee charged for every transaction.
pub const FEE: u64 = 1;

const TX_HASH_LENGTH: usize = 32;
const SIGNATURE_LENGTH: usize = 64;

/// Unsigned transaction contents, encoded as JSON.
#[derive(Serialize, Deserialize)]
struct Draft {
    account: String,
    fee: u64,
    outputs: Vec<Output>,
    nonce: u64,
}

#[derive(Default)]
struct State {
    nonce: u64,
    packaged: HashMap<String, Vec<u8>>,
    posted: HashMap<String, TransactionSummary>,
    fail_broadcast: bool,
}

/// Node holding transactions in memory.
///
/// Signing packages carry the transaction hash followed by every
/// commitment; signature shares are checked against the values the
/// emulated devices produce.
#[derive(Default)]
pub struct MemoryNode {
    state: Mutex<State>,
}

impl MemoryNode {
    /// Make every broadcast fail as if the connection dropped.
    pub fn fail_broadcast(&self, fail: bool) {
        self.state.lock().unwrap().fail_broadcast = fail;
    }

    /// Number of transactions accepted.
    pub fn posted(&self) -> usize {
        self.state.lock().unwrap().posted.len()
    }

    fn post(
        &self,
        transaction: &[u8],
        tx_hash: &TxHash,
        broadcast: bool,
    ) -> Result<BroadcastResult, ServiceError> {
        let draft: Draft = serde_json::from_slice(transaction)?;
        let mut state = self.state.lock().unwrap();
        if state.fail_broadcast {
            let reset = "connection reset".to_string();
            return Err(ServiceError::Other(reset));
        }
        let hash = tx_hash.to_hex();
        state.posted.insert(
            hash.clone(),
            TransactionSummary {
                hash: hash.clone(),
                account: draft.account,
                fee: draft.fee,
                outputs: draft.outputs,
            },
        );
        Ok(BroadcastResult {
            hash,
            accepted: broadcast,
        })
    }
}

fn decode(e: DecodeError) -> ServiceError {
    ServiceError::Remote {
        code: -32602,
        message: e.to_string(),
    }
}

fn rejected(message: &str) -> ServiceError {
    ServiceError::Remote {
        code: -32000,
        message: message.to_string(),
    }
}

#[async_trait]
impl NodeRpc for MemoryNode {
    async fn build_unsigned_transaction(
        &self,
        account: &str,
        outputs: &[Output],
    ) -> Result<UnsignedTransaction, ServiceError> {
        let nonce = {
            let mut state = self.state.lock().unwrap();
            state.nonce += 1;
            state.nonce
        };
        let draft = Draft {
            account: account.to_string(),
            fee: FEE,
            outputs: outputs.to_vec(),
            nonce,
        };
        UnsignedTransaction::from_bytes(serde_json::to_vec(&draft)?)
            .map_err(decode)
    }

    async fn create_signing_package(
        &self,
        commitments: &[CommitmentEnvelope],
        transaction: &UnsignedTransaction,
        _account: &str,
    ) -> Result<SigningPackage, ServiceError> {
        let tx_hash =
            DeviceEmulator::transaction_hash(transaction.as_bytes())
                .map_err(decode)?;
        let mut bytes = tx_hash.as_bytes().to_vec();
        for commitment in commitments {
            if commitment.tx_hash != tx_hash {
                return Err(rejected(
                    "commitment for another transaction",
                ));
            }
            bytes.extend_from_slice(commitment.identity.as_bytes());
            bytes.extend_from_slice(commitment.commitment.as_bytes());
        }
        self.state
            .lock()
            .unwrap()
            .packaged
            .insert(tx_hash.to_hex(), transaction.as_bytes().to_vec());
        SigningPackage::from_bytes(bytes).map_err(decode)
    }

    async fn aggregate_signature_shares(
        &self,
        package: &SigningPackage,
        shares: &[ShareEnvelope],
        account: &str,
        broadcast: bool,
    ) -> Result<BroadcastResult, ServiceError> {
        let hash_bytes = package
            .as_bytes()
            .get(..TX_HASH_LENGTH)
            .ok_or_else(|| rejected("malformed signing package"))?;
        let tx_hash =
            TxHash::from_bytes(hash_bytes.to_vec()).map_err(decode)?;
        for share in shares {
            let expected = DeviceEmulator::expected_share(
                package,
                &share.identity,
                &tx_hash,
            )
            .map_err(decode)?;
            if share.share != expected {
                return Err(rejected("invalid signature share"));
            }
        }

        let transaction = self
            .state
            .lock()
            .unwrap()
            .packaged
            .get(&tx_hash.to_hex())
            .cloned()
            .ok_or_else(|| rejected("unknown signing package"))?;
        let result = self.post(&transaction, &tx_hash, broadcast)?;
        if result.accepted {
            tracing::debug!(account, hash = %result.hash, "aggregated");
        }
        Ok(result)
    }

    async fn add_signature_to_transaction(
        &self,
        transaction: &UnsignedTransaction,
        signature: &Signature,
    ) -> Result<Transaction, ServiceError> {
        let mut bytes = transaction.as_bytes().to_vec();
        bytes.extend_from_slice(signature.as_bytes());
        Transaction::from_bytes(bytes).map_err(decode)
    }

    async fn submit_transaction(
        &self,
        transaction: &Transaction,
        broadcast: bool,
    ) -> Result<BroadcastResult, ServiceError> {
        let bytes = transaction.as_bytes();
        let unsigned = bytes
            .len()
            .checked_sub(SIGNATURE_LENGTH)
            .map(|end| &bytes[..end])
            .ok_or_else(|| rejected("transaction is not signed"))?;
        let tx_hash =
            DeviceEmulator::transaction_hash(unsigned).map_err(decode)?;
        self.post(unsigned, &tx_hash, broadcast)
    }

    async fn get_transaction(
        &self,
        account: &str,
        hash: &str,
    ) -> Result<Option<TransactionSummary>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .posted
            .get(hash)
            .filter(|summary| summary.account == account)
            .cloned())
    }
}
