//! Signing operations of the Iron Fish device application.
use crate::{
    app::{self, AppVersion},
    DeviceQueue, Identity, Result, Signature, SignatureShare,
    SigningCommitment, SigningPackage, TxHash, UnsignedTransaction,
};

/// Signing operations of the device application.
///
/// Every operation is submitted to the shared [DeviceQueue] and so
/// never overlaps status polling or other signing requests.
#[derive(Clone)]
pub struct DeviceSigner {
    queue: DeviceQueue,
    account: u32,
}

impl DeviceSigner {
    /// Create a signer for an account.
    pub fn new(queue: DeviceQueue, account: u32) -> Self {
        Self { queue, account }
    }

    /// Account used for derivation paths.
    pub fn account(&self) -> u32 {
        self.account
    }

    /// Queue used by this signer.
    pub fn queue(&self) -> &DeviceQueue {
        &self.queue
    }

    /// Derive the threshold identity at an index.
    pub async fn derive_identity(&self, index: u8) -> Result<Identity> {
        tracing::debug!(index, "derive identity");
        self.queue
            .enqueue(move |session| {
                app::derive_identity(session, index)
            })
            .await?
    }

    /// Display the transaction and wait for operator approval.
    ///
    /// Returns the transaction hash computed by the device.
    pub async fn review_transaction(
        &self,
        transaction: &UnsignedTransaction,
    ) -> Result<TxHash> {
        tracing::info!(
            bytes = transaction.as_bytes().len(),
            "review transaction on device"
        );
        let account = self.account;
        let transaction = transaction.clone();
        let tx_hash = self
            .queue
            .enqueue(move |session| {
                app::review_transaction(session, account, &transaction)
            })
            .await??;
        tracing::info!(tx_hash = %tx_hash, "transaction approved");
        Ok(tx_hash)
    }

    /// Signing commitment for the reviewed transaction hash.
    pub async fn get_signing_commitment(
        &self,
        tx_hash: &TxHash,
    ) -> Result<SigningCommitment> {
        let account = self.account;
        let tx_hash = tx_hash.clone();
        self.queue
            .enqueue(move |session| {
                app::signing_commitment(session, account, &tx_hash)
            })
            .await?
    }

    /// Signature share over the signing package.
    pub async fn create_signature_share(
        &self,
        package: &SigningPackage,
        identity: &Identity,
    ) -> Result<SignatureShare> {
        tracing::debug!(identity = ?identity, "create signature share");
        let account = self.account;
        let package = package.clone();
        let identity = identity.clone();
        self.queue
            .enqueue(move |session| {
                app::signature_share(
                    session, account, &package, &identity,
                )
            })
            .await?
    }

    /// Sign a transaction with the single device key.
    pub async fn sign_single_key_transaction(
        &self,
        transaction: &UnsignedTransaction,
    ) -> Result<Signature> {
        tracing::info!("sign transaction on device");
        let account = self.account;
        let transaction = transaction.clone();
        self.queue
            .enqueue(move |session| {
                app::sign_transaction(session, account, &transaction)
            })
            .await?
    }

    /// Public address of the account.
    pub async fn get_public_address(&self) -> Result<String> {
        let account = self.account;
        self.queue
            .enqueue(move |session| {
                app::public_address(session, account)
            })
            .await?
    }

    /// Version of the signing application.
    pub async fn app_version(&self) -> Result<AppVersion> {
        self.queue.enqueue(app::app_version).await?
    }
}
