//! Serialized access to a hardware signing device.
//!
//! All communication with the device is funneled through a single
//! [DeviceQueue] whose worker thread exclusively owns the
//! [DeviceSession]. The [ConnectionMonitor] polls the device status
//! through that queue while subscribers exist and the [DeviceSigner]
//! exposes the cryptographic primitives of the signing application.
//!
//! The transport is pluggable via the [Connector] and [Transport]
//! traits; the `hid` feature provides a USB HID connector for Ledger
//! devices and the `emulator` feature an in-process device useful
//! for tests and demonstrations.
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod apdu;
pub mod app;
mod blob;
mod classify;
mod error;
mod monitor;
mod queue;
mod session;
mod signer;
mod status;
mod transport;

#[cfg(feature = "hid")]
pub mod hid;

#[cfg(any(test, feature = "emulator"))]
pub mod emulator;

pub use blob::{
    decode_hex, DecodeError, Identity, Signature, SignatureShare,
    SigningCommitment, SigningPackage, Transaction, TxHash,
    UnsignedTransaction,
};
pub use classify::{classify, ErrorKind};
pub use error::Error;
pub use monitor::{ConnectionMonitor, MonitorOptions, SubscriptionId};
pub use queue::DeviceQueue;
pub use session::DeviceSession;
pub use signer::DeviceSigner;
pub use status::{ConnectionStatus, DeviceState};
pub use transport::{Connector, DeviceInfo, Transport, TransportError};

/// Result type for the device library.
pub type Result<T> = std::result::Result<T, Error>;
