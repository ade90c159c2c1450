//! Node client speaking newline delimited JSON-RPC over TCP.
use async_trait::async_trait;
use coldsig_ceremony::{
    BroadcastResult, CommitmentEnvelope, NodeRpc, Output, ServiceError,
    ShareEnvelope, TransactionSummary,
};
use coldsig_device::{
    Signature, SigningPackage, Transaction, UnsignedTransaction,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// JSON-RPC client for the node.
///
/// Every request opens a connection, writes one request line and
/// reads one response line.
pub struct JsonRpcClient {
    address: String,
    request_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create a client for a `host:port` address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            request_id: AtomicU64::new(0),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ServiceError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(id, method, "rpc request");

        let stream = TcpStream::connect(&self.address).await?;
        let (reader, mut writer) = stream.into_split();
        let mut line = serde_json::to_string(&RpcRequest {
            id,
            method,
            params,
        })?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;

        let mut response = String::new();
        BufReader::new(reader).read_line(&mut response).await?;
        let response: RpcResponse =
            serde_json::from_str(response.trim())?;

        if response.id != id {
            return Err(ServiceError::Other(format!(
                "mismatched response id: expected {} got {}",
                id, response.id
            )));
        }
        if let Some(error) = response.error {
            return Err(ServiceError::Remote {
                code: error.code,
                message: error.message,
            });
        }
        let result = response.result.ok_or_else(|| {
            ServiceError::Other(format!("no result for {method}"))
        })?;
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl NodeRpc for JsonRpcClient {
    async fn build_unsigned_transaction(
        &self,
        account: &str,
        outputs: &[Output],
    ) -> Result<UnsignedTransaction, ServiceError> {
        self.call(
            "wallet/buildUnsignedTransaction",
            json!({ "account": account, "outputs": outputs }),
        )
        .await
    }

    async fn create_signing_package(
        &self,
        commitments: &[CommitmentEnvelope],
        transaction: &UnsignedTransaction,
        account: &str,
    ) -> Result<SigningPackage, ServiceError> {
        self.call(
            "wallet/multisig/createSigningPackage",
            json!({
                "account": account,
                "unsignedTransaction": transaction,
                "commitments": commitments,
            }),
        )
        .await
    }

    async fn aggregate_signature_shares(
        &self,
        package: &SigningPackage,
        shares: &[ShareEnvelope],
        account: &str,
        broadcast: bool,
    ) -> Result<BroadcastResult, ServiceError> {
        self.call(
            "wallet/multisig/aggregateSignatureShares",
            json!({
                "account": account,
                "signingPackage": package,
                "signatureShares": shares,
                "broadcast": broadcast,
            }),
        )
        .await
    }

    async fn add_signature_to_transaction(
        &self,
        transaction: &UnsignedTransaction,
        signature: &Signature,
    ) -> Result<Transaction, ServiceError> {
        self.call(
            "wallet/addSignature",
            json!({
                "unsignedTransaction": transaction,
                "signature": signature,
            }),
        )
        .await
    }

    async fn submit_transaction(
        &self,
        transaction: &Transaction,
        broadcast: bool,
    ) -> Result<BroadcastResult, ServiceError> {
        self.call(
            "wallet/postTransaction",
            json!({
                "transaction": transaction,
                "broadcast": broadcast,
            }),
        )
        .await
    }

    async fn get_transaction(
        &self,
        account: &str,
        hash: &str,
    ) -> Result<Option<TransactionSummary>, ServiceError> {
        self.call(
            "wallet/getTransaction",
            json!({ "account": account, "hash": hash }),
        )
        .await
    }
}
