use crate::{ServiceError, Step};
use coldsig_device::{DecodeError, DeviceState, TxHash};
use thiserror::Error;

/// Errors generated by the ceremony library.
#[derive(Debug, Error)]
pub enum Error {
    /// Device operation failed.
    #[error(transparent)]
    Device(#[from] coldsig_device::Error),

    /// Error generated when a device step is attempted while the
    /// device is not connected, unlocked and running the app.
    #[error("device is not ready ({0:?})")]
    DeviceNotReady(DeviceState),

    /// Error generated when an action does not belong to the
    /// current step.
    #[error("cannot {action} in step {step}")]
    InvalidStep {
        /// Attempted action.
        action: &'static str,
        /// Current step.
        step: Step,
    },

    /// Error generated when pasted data cannot be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Error generated when pasted data is well formed but
    /// unusable in the ceremony.
    #[error("invalid {label}: {reason}")]
    InvalidInput {
        /// Kind of input.
        label: &'static str,
        /// Description of the problem.
        reason: String,
    },

    /// Error generated when a party reviewed a different transaction
    /// than the coordinator.
    #[error(
        "transaction hash mismatch, expected {expected} got {actual}"
    )]
    TxHashMismatch {
        /// Hash reviewed by the coordinator.
        expected: TxHash,
        /// Hash reviewed by the other party.
        actual: TxHash,
    },

    /// Error generated when a collaborator fails during a step.
    #[error("{step} failed: {source}")]
    Step {
        /// Failed step.
        step: &'static str,
        /// Collaborator error.
        #[source]
        source: ServiceError,
    },

    /// Error generated when broadcasting failed; the transaction
    /// may or may not have reached the network.
    #[error("broadcast outcome unknown: {0}")]
    BroadcastOutcomeUnknown(#[source] ServiceError),
}

impl Error {
    /// Stable identifier for the error category.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Device(coldsig_device::Error::QueueClosed) => {
                "QUEUE_CLOSED"
            }
            Error::Device(e) => e.code(),
            Error::DeviceNotReady(_) => "DEVICE_NOT_READY",
            Error::InvalidStep { .. } => "INVALID_STEP",
            Error::Decode(_) | Error::InvalidInput { .. } => {
                "INVALID_CEREMONY_INPUT"
            }
            Error::TxHashMismatch { .. } => "TX_HASH_MISMATCH",
            Error::Step { .. } => "CEREMONY_STEP_ERROR",
            Error::BroadcastOutcomeUnknown(_) => {
                "BROADCAST_OUTCOME_UNKNOWN"
            }
        }
    }

    /// Whether invoking the same action again may succeed.
    pub fn retryable(&self) -> bool {
        !matches!(
            self,
            Error::TxHashMismatch { .. }
                | Error::InvalidStep { .. }
                | Error::BroadcastOutcomeUnknown(_)
        )
    }

    pub(crate) fn invalid(
        label: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidInput {
            label,
            reason: reason.into(),
        }
    }
}

/// Summary of the last failed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Action that failed.
    pub action: &'static str,
    /// Error category.
    pub code: &'static str,
    /// Error message.
    pub message: String,
    /// Whether the action may be retried.
    pub retryable: bool,
}

impl Failure {
    pub(crate) fn new(action: &'static str, error: &Error) -> Self {
        Self {
            action,
            code: error.code(),
            message: error.to_string(),
            retryable: error.retryable(),
        }
    }
}
