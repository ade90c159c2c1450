use crate::{classify, ErrorKind, TransportError};
use thiserror::Error;

/// Errors generated by the device library.
#[derive(Debug, Error)]
pub enum Error {
    /// Device or transport failure with its classified category.
    #[error("{kind}: {source}")]
    Device {
        /// Classified category of the failure.
        kind: ErrorKind,
        /// Raw transport failure.
        #[source]
        source: TransportError,
    },

    /// Error generated when the device answers with a payload
    /// that does not match the request.
    #[error("unexpected response to {operation}: {reason}")]
    InvalidResponse {
        /// Name of the device operation.
        operation: &'static str,
        /// Description of the problem.
        reason: String,
    },

    /// Error generated when the operation queue worker has stopped.
    #[error("device operation queue is closed")]
    QueueClosed,

    /// Error generated when a queued operation was dropped before
    /// delivering a result, its outcome on the device is unknown.
    #[error("device operation aborted before completion")]
    OperationAborted,

    /// Error generated when the monitor is created outside of
    /// a tokio runtime.
    #[error("connection monitor requires a tokio runtime")]
    NoRuntime,

    /// Error generated by input/output.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Category of this error.
    ///
    /// Failures that did not originate from the device transport
    /// classify as [ErrorKind::Unknown].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Device { kind, .. } => *kind,
            _ => ErrorKind::Unknown,
        }
    }

    /// Stable identifier for the error category.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }
}

impl From<TransportError> for Error {
    fn from(source: TransportError) -> Self {
        Error::Device {
            kind: classify(&source),
            source,
        }
    }
}
