//! Account store backed by a JSON file.
use async_trait::async_trait;
use coldsig_ceremony::{AccountStore, ServiceError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::{fs, sync::Mutex};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Accounts {
    #[serde(default)]
    hardware_signers: Vec<String>,
}

/// Records hardware signer accounts in a JSON file.
pub struct FileAccountStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileAccountStore {
    /// Create a store for the file, which need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Addresses marked as hardware signers.
    pub async fn hardware_signers(
        &self,
    ) -> Result<Vec<String>, ServiceError> {
        Ok(self.read().await?.hardware_signers)
    }

    async fn read(&self) -> Result<Accounts, ServiceError> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Accounts::default());
        }
        let contents = fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&contents)?)
    }
}

#[async_trait]
impl AccountStore for FileAccountStore {
    async fn mark_account_as_hardware_signer(
        &self,
        public_address: &str,
    ) -> Result<(), ServiceError> {
        let _guard = self.lock.lock().await;
        let mut accounts = self.read().await?;
        if accounts
            .hardware_signers
            .iter()
            .any(|a| a == public_address)
        {
            return Ok(());
        }
        accounts.hardware_signers.push(public_address.to_string());
        let contents = serde_json::to_vec_pretty(&accounts)?;
        fs::write(&self.path, contents).await?;
        Ok(())
    }
}
