//! Classification of raw device failures.
use crate::TransportError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status word returned while the device screen is locked.
pub const SW_LOCKED_DEVICE: u16 = 0x5515;

/// Status word returned for an unknown instruction.
pub const SW_INS_NOT_SUPPORTED: u16 = 0x6d00;

/// Status words meaning the expected application is not running.
const APP_UNAVAILABLE: [u16; 4] = [0x6e00, 0x6e01, 0x6511, 0x6a15];

const NOT_FOUND_IDS: [&str; 3] =
    ["ListenTimeout", "NoDeviceFound", "DeviceNotFound"];

const BUSY_IDS: [&str; 2] =
    ["TransportRaceCondition", "TransportLocked"];

/// Semantic category of a device failure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Device screen is locked.
    Locked,
    /// Device is unlocked but the signing application is not open.
    AppNotOpen,
    /// Running application does not support the instruction.
    UnsupportedInstruction,
    /// Device is busy with another exchange.
    DeviceBusy,
    /// No device could be found.
    NotFound,
    /// A device exists but could not be opened, usually because
    /// another process holds the port.
    CannotOpen,
    /// Failure without a known signature.
    Unknown,
}

impl ErrorKind {
    /// Stable identifier for the category.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Locked => "DEVICE_LOCKED",
            ErrorKind::AppNotOpen => "APP_NOT_OPEN",
            ErrorKind::UnsupportedInstruction => {
                "UNSUPPORTED_INSTRUCTION"
            }
            ErrorKind::DeviceBusy => "DEVICE_BUSY",
            ErrorKind::NotFound => "DEVICE_NOT_FOUND",
            ErrorKind::CannotOpen => "CANNOT_OPEN_DEVICE",
            ErrorKind::Unknown => "UNKNOWN_DEVICE_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorKind::Locked => "device is locked",
            ErrorKind::AppNotOpen => "signing app is not open",
            ErrorKind::UnsupportedInstruction => {
                "instruction not supported by the open app"
            }
            ErrorKind::DeviceBusy => "device is busy",
            ErrorKind::NotFound => "device not found",
            ErrorKind::CannotOpen => "cannot open device",
            ErrorKind::Unknown => "unknown device error",
        };
        f.write_str(message)
    }
}

/// Map a raw transport failure to its category.
///
/// Status words are inspected first, then discovery identifiers and
/// finally the failure message. Every input yields a category.
pub fn classify(error: &TransportError) -> ErrorKind {
    let by_code = match error {
        TransportError::Status(code) => classify_status(*code),
        _ => None,
    };

    let by_id = match error {
        TransportError::Discovery { id, .. } => classify_id(id),
        _ => None,
    };

    by_code
        .or(by_id)
        .or_else(|| match error {
            TransportError::Status(_) => None,
            TransportError::Discovery { message, .. }
            | TransportError::Other(message) => {
                classify_message(message)
            }
        })
        .unwrap_or(ErrorKind::Unknown)
}

fn classify_status(code: u16) -> Option<ErrorKind> {
    if code == SW_LOCKED_DEVICE {
        Some(ErrorKind::Locked)
    } else if APP_UNAVAILABLE.contains(&code) {
        Some(ErrorKind::AppNotOpen)
    } else if code == SW_INS_NOT_SUPPORTED {
        Some(ErrorKind::UnsupportedInstruction)
    } else {
        None
    }
}

fn classify_id(id: &str) -> Option<ErrorKind> {
    if NOT_FOUND_IDS.contains(&id) {
        Some(ErrorKind::NotFound)
    } else if BUSY_IDS.contains(&id) {
        Some(ErrorKind::DeviceBusy)
    } else {
        None
    }
}

fn classify_message(message: &str) -> Option<ErrorKind> {
    let message = message.to_lowercase();
    // "cannot open" contains "not open" so it is checked first
    if message.contains("cannot open device")
        || message.contains("could not open")
        || message.contains("failed opening")
    {
        Some(ErrorKind::CannotOpen)
    } else if message.contains("locked") {
        Some(ErrorKind::Locked)
    } else if message.contains("busy")
        || message.contains("already pending")
    {
        Some(ErrorKind::DeviceBusy)
    } else if message.contains("no device")
        || message.contains("device not found")
    {
        Some(ErrorKind::NotFound)
    } else if message.contains("not open")
        || message.contains("not seem to be open")
    {
        Some(ErrorKind::AppNotOpen)
    } else {
        None
    }
}
