//! Crate-wide error taxonomy.
//!
//! One variant per error kind named in the core's error handling design:
//! `NotFound`, `PermissionDenied`, `Busy`, `Disconnected`, `Io`, `InvalidArgument`,
//! `Cancelled`, `Timeout`, `Unsupported`. Most of these are handled internally
//! by the registry and effect engine (see the recovery column of the error
//! handling table); only `InvalidArgument` and an empty Selection are meant
//! to surface to library callers in ordinary operation.
use serde::Serialize;
use thiserror::Error;

/// Unified error type for lumenctl-core operations.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum LumenError {
    #[error("no device matched the selector")]
    NotFound,

    #[error("permission denied opening device: {0}")]
    PermissionDenied(String),

    #[error("device busy (already open elsewhere): {0}")]
    Busy(String),

    #[error("device disconnected: {0}")]
    Disconnected(String),

    #[error("transport I/O error: {0}")]
    Io(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("operation cancelled")]
    Cancelled,

    #[serde(skip)]
    #[error("transport read/write timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("operation not supported by this driver/transport: {0}")]
    Unsupported(String),
}

/// Convenience Result type alias with `LumenError`.
pub type Result<T> = std::result::Result<T, LumenError>;

impl From<hidapi::HidError> for LumenError {
    fn from(err: hidapi::HidError) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serialport::Error> for LumenError {
    fn from(err: serialport::Error) -> Self {
        use serialport::ErrorKind;
        match err.kind {
            ErrorKind::NoDevice => Self::Disconnected(err.description),
            ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                Self::PermissionDenied(err.description)
            }
            ErrorKind::Io(std::io::ErrorKind::TimedOut) => {
                Self::Timeout(std::time::Duration::default())
            }
            _ => Self::Io(err.description),
        }
    }
}

impl From<regex::Error> for LumenError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidArgument(format!("bad pattern: {err}"))
    }
}

impl From<LumenError> for String {
    fn from(err: LumenError) -> Self {
        err.to_string()
    }
}
