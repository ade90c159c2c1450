//! Point in time device connection status.
use crate::ErrorKind;
use serde::{Serialize, Serializer};

/// State of the attached device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeviceState {
    /// No usable device.
    #[default]
    Disconnected,
    /// Device attached with its screen locked.
    Locked,
    /// Device unlocked but the signing app is not running.
    AppClosed,
    /// Signing app open and answering.
    Ready {
        /// Public address for the configured account.
        public_address: String,
        /// Product label of the device.
        device_name: String,
    },
}

impl DeviceState {
    /// State implied by a failed status query.
    pub fn from_error_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Locked => DeviceState::Locked,
            ErrorKind::AppNotOpen
            | ErrorKind::UnsupportedInstruction
            | ErrorKind::DeviceBusy => DeviceState::AppClosed,
            ErrorKind::NotFound
            | ErrorKind::CannotOpen
            | ErrorKind::Unknown => DeviceState::Disconnected,
        }
    }
}

/// Status published by the connection monitor.
///
/// The flags are derived from a [DeviceState] so only consistent
/// combinations can be observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus(DeviceState);

impl ConnectionStatus {
    /// Underlying device state.
    pub fn state(&self) -> &DeviceState {
        &self.0
    }

    /// Whether a device is attached.
    pub fn is_ledger_connected(&self) -> bool {
        !matches!(self.0, DeviceState::Disconnected)
    }

    /// Whether the device screen is unlocked.
    pub fn is_ledger_unlocked(&self) -> bool {
        matches!(
            self.0,
            DeviceState::AppClosed | DeviceState::Ready { .. }
        )
    }

    /// Whether the signing application is open.
    pub fn is_app_open(&self) -> bool {
        self.is_ready()
    }

    /// Whether device steps may be attempted.
    pub fn is_ready(&self) -> bool {
        matches!(self.0, DeviceState::Ready { .. })
    }

    /// Public address reported by the signing application.
    pub fn public_address(&self) -> Option<&str> {
        match &self.0 {
            DeviceState::Ready { public_address, .. } => {
                Some(public_address)
            }
            _ => None,
        }
    }

    /// Product label of the device.
    pub fn device_name(&self) -> Option<&str> {
        match &self.0 {
            DeviceState::Ready { device_name, .. } => Some(device_name),
            _ => None,
        }
    }
}

impl From<DeviceState> for ConnectionStatus {
    fn from(value: DeviceState) -> Self {
        Self(value)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusRecord<'a> {
    is_ledger_connected: bool,
    is_ledger_unlocked: bool,
    is_ironfish_app_open: bool,
    public_address: Option<&'a str>,
    device_name: Option<&'a str>,
}

impl Serialize for ConnectionStatus {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        StatusRecord {
            is_ledger_connected: self.is_ledger_connected(),
            is_ledger_unlocked: self.is_ledger_unlocked(),
            is_ironfish_app_open: self.is_app_open(),
            public_address: self.public_address(),
            device_name: self.device_name(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_follow_state() {
        let locked = ConnectionStatus::from(DeviceState::Locked);
        assert!(locked.is_ledger_connected());
        assert!(!locked.is_ledger_unlocked());
        assert!(!locked.is_app_open());

        let closed = ConnectionStatus::from(DeviceState::AppClosed);
        assert!(closed.is_ledger_connected());
        assert!(closed.is_ledger_unlocked());
        assert!(!closed.is_app_open());
        assert!(closed.public_address().is_none());

        let ready = ConnectionStatus::from(DeviceState::Ready {
            public_address: "ab".to_string(),
            device_name: "Nano X".to_string(),
        });
        assert!(ready.is_ledger_unlocked() && ready.is_app_open());
        assert_eq!(Some("Nano X"), ready.device_name());

        let empty = ConnectionStatus::default();
        assert!(!empty.is_ledger_connected());
        assert!(!empty.is_ledger_unlocked());
    }

    #[test]
    fn error_kinds_to_states() {
        assert_eq!(
            DeviceState::Locked,
            DeviceState::from_error_kind(ErrorKind::Locked)
        );
        for kind in [
            ErrorKind::AppNotOpen,
            ErrorKind::UnsupportedInstruction,
            ErrorKind::DeviceBusy,
        ] {
            assert_eq!(
                DeviceState::AppClosed,
                DeviceState::from_error_kind(kind)
            );
        }
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::CannotOpen,
            ErrorKind::Unknown,
        ] {
            assert_eq!(
                DeviceState::Disconnected,
                DeviceState::from_error_kind(kind)
            );
        }
    }
}
