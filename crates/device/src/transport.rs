//! Traits implemented by device transports.
use crate::apdu::{ApduAnswer, ApduCommand};
use thiserror::Error;

/// Raw failure reported while talking to a device.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Device answered with a status word other than success.
    #[error("device returned status 0x{0:04x}")]
    Status(u16),

    /// Device discovery failed with a known identifier.
    #[error("{id}: {message}")]
    Discovery {
        /// Identifier of the discovery failure.
        id: String,
        /// Description of the failure.
        message: String,
    },

    /// Any other failure of the transport layer.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether the failure happened on the channel itself rather
    /// than being an answer from the device.
    ///
    /// A channel failure invalidates the transport handle.
    pub fn is_channel_failure(&self) -> bool {
        !matches!(self, TransportError::Status(_))
    }
}

/// Information about an opened device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Product label, for example `Nano X`.
    pub label: String,
}

/// Channel able to exchange APDUs with a device.
///
/// Implementations are blocking; they are only ever called from the
/// device queue worker thread.
pub trait Transport: Send {
    /// Send a command and wait for the answer.
    fn exchange(
        &mut self,
        command: &ApduCommand,
    ) -> Result<ApduAnswer, TransportError>;
}

/// Opens transports to an attached device.
pub trait Connector: Send {
    /// Discover and open the first available device.
    fn open(
        &mut self,
    ) -> Result<(Box<dyn Transport>, DeviceInfo), TransportError>;
}
