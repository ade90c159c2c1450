//! Device session owning the transport handle.
use crate::{
    apdu::ApduCommand, Connector, DeviceInfo, Transport, TransportError,
};

/// Relationship with the attached device.
///
/// The session is owned by the [DeviceQueue](crate::DeviceQueue)
/// worker and lent to one operation at a time. The transport is
/// opened lazily and dropped whenever the channel fails so the next
/// operation starts from a fresh connection.
pub struct DeviceSession {
    connector: Box<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
    info: Option<DeviceInfo>,
}

impl DeviceSession {
    pub(crate) fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            transport: None,
            info: None,
        }
    }

    /// Whether a transport handle is currently open.
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Label of the connected device.
    pub fn label(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.label.as_str())
    }

    /// Open the transport unless already open.
    pub fn connect(&mut self) -> Result<(), TransportError> {
        self.transport().map(|_| ())
    }

    /// Drop the transport handle.
    pub fn disconnect(&mut self) {
        if self.transport.take().is_some() {
            tracing::debug!(
                label = ?self.label(),
                "device session closed"
            );
        }
        self.info = None;
    }

    /// Send a command and return the payload of a successful answer.
    pub fn exchange(
        &mut self,
        command: &ApduCommand,
    ) -> Result<Vec<u8>, TransportError> {
        let result = self.transport()?.exchange(command);
        match result {
            Ok(answer) => answer.into_result(),
            Err(e) => {
                if e.is_channel_failure() {
                    tracing::warn!(
                        error = %e,
                        "device transport failed"
                    );
                    self.disconnect();
                }
                Err(e)
            }
        }
    }

    /// Send a sequence of chunk commands.
    ///
    /// Every chunk must succeed; the payload of the final answer
    /// is returned.
    pub fn exchange_chunks(
        &mut self,
        commands: &[ApduCommand],
    ) -> Result<Vec<u8>, TransportError> {
        let mut response = Vec::new();
        for command in commands {
            response = self.exchange(command)?;
        }
        Ok(response)
    }

    fn transport(
        &mut self,
    ) -> Result<&mut Box<dyn Transport>, TransportError> {
        if self.transport.is_none() {
            let (transport, info) = self.connector.open()?;
            tracing::debug!(
                label = %info.label,
                "device session opened"
            );
            self.transport = Some(transport);
            self.info = Some(info);
        }
        self.transport.as_mut().ok_or_else(|| {
            TransportError::Other("transport unavailable".to_string())
        })
    }
}
