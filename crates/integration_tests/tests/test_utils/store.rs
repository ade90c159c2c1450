use async_trait::async_trait;
use coldsig_ceremony::{AccountStore, ServiceError};
use std::sync::Mutex;

/// Account store keeping hardware signers in memory.
#[derive(Default)]
pub struct MemoryStore {
    signers: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn hardware_signers(&self) -> Vec<String> {
        self.signers.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn mark_account_as_hardware_signer(
        &self,
        public_address: &str,
    ) -> Result<(), ServiceError> {
        let mut signers = self.signers.lock().unwrap();
        if !signers.iter().any(|s| s == public_address) {
            signers.push(public_address.to_string());
        }
        Ok(())
    }
}
