//! Command line configuration.
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::fs;

/// Configuration loaded from a TOML file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device settings.
    pub device: DeviceConfig,
    /// Node connection.
    pub rpc: RpcConfig,
    /// Account store.
    pub store: StoreConfig,
}

/// Device settings.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DeviceConfig {
    /// Status poll interval in milliseconds.
    ///
    /// Default is 500.
    pub poll_interval: u64,
    /// Account used for derivation paths.
    pub account: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            poll_interval: 500,
            account: 0,
        }
    }
}

impl DeviceConfig {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }
}

/// Node connection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RpcConfig {
    /// Address of the node JSON-RPC listener.
    pub address: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8020".to_string(),
        }
    }
}

/// Account store.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StoreConfig {
    /// File recording hardware signer accounts.
    ///
    /// Relative paths resolve against the configuration directory.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("accounts.json"),
        }
    }
}

impl Config {
    /// Load a config from a file path.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !fs::try_exists(path).await? {
            bail!("config file {} does not exist", path.display());
        }

        let contents = fs::read_to_string(path).await?;
        let mut config: Config = toml::from_str(&contents)
            .with_context(|| {
                format!("invalid config {}", path.display())
            })?;
        config.validate()?;

        if config.store.path.is_relative() {
            let dir = path.parent().with_context(|| {
                format!("no parent directory for {}", path.display())
            })?;
            config.store.path = dir.join(&config.store.path);
        }

        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.device.poll_interval == 0 {
            bail!("device poll-interval must be greater than zero");
        }
        if self.rpc.address.trim().is_empty() {
            bail!("rpc address must not be empty");
        }
        Ok(())
    }
}
