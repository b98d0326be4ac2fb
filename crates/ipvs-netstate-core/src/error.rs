//! Error types for network-state operations
//!
//! Every failure carries the device and/or address it concerns so the
//! calling reconciliation loop can log it without extra bookkeeping.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::model::LinkKind;

/// Result type alias for network-state operations
pub type Result<T> = std::result::Result<T, Error>;

/// Kernel operation that failed, used as context in [`Error::OperationFailed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    LookupLink,
    CreateLink,
    DeleteLink,
    BindAddress,
    UnbindAddress,
    ListRoutes,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::LookupLink => "get interface",
            Operation::CreateLink => "create interface",
            Operation::DeleteLink => "delete interface",
            Operation::BindAddress => "bind address",
            Operation::UnbindAddress => "unbind address",
            Operation::ListRoutes => "list route table",
        };
        f.write_str(name)
    }
}

/// Error class, independent of the concrete variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Referenced interface or address binding does not exist
    NotFound,
    /// A supplied address string is not a valid IP literal
    InvalidInput,
    /// Resource already exists. Classification only: `Error::kind()`
    /// never returns it, since the ensure-style operations absorb
    /// duplicates into `Ok(true)`.
    DuplicateResource,
    /// A non-dummy link was passed to the dummy-device delete path
    TypeMismatch,
    /// Any other kernel-reported failure
    OperationFailed,
    /// Invalid configuration
    Config,
}

/// Core error type for network-state operations
#[derive(Error, Debug)]
pub enum Error {
    /// Interface lookup found nothing
    #[error("interface not found: {device}")]
    DeviceNotFound {
        /// Interface name
        device: String,
    },

    /// The kernel reported that the address is not bound to the interface
    #[error("address {address} is not bound to interface {device}")]
    AddressNotBound {
        /// Address literal as supplied by the caller
        address: String,
        /// Interface name
        device: String,
    },

    /// Address literal did not parse
    #[error("error parse ip address: {address}")]
    InvalidAddress {
        /// Offending literal
        address: String,
    },

    /// Refused to treat a non-dummy link as a dummy device
    #[error("expect dummy device {device}, got device type: {actual}")]
    TypeMismatch {
        /// Interface name
        device: String,
        /// Kind the kernel reported
        actual: LinkKind,
    },

    /// Kernel call failed for any other reason
    #[error("{operation} failed for {target}: {source}")]
    OperationFailed {
        /// What was being attempted
        operation: Operation,
        /// Device and/or address the operation concerned
        target: String,
        /// Underlying kernel error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a "device not found" error
    pub fn not_found(device: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            device: device.into(),
        }
    }

    /// Create an invalid address error
    pub fn invalid_input(address: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap a kernel error with the operation and target it concerned
    pub fn operation_failed(
        operation: Operation,
        target: impl Into<String>,
        source: io::Error,
    ) -> Self {
        Self::OperationFailed {
            operation,
            target: target.into(),
            source,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DeviceNotFound { .. } | Error::AddressNotBound { .. } => ErrorKind::NotFound,
            Error::InvalidAddress { .. } => ErrorKind::InvalidInput,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::OperationFailed { .. } => ErrorKind::OperationFailed,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether this is a missing device or a missing binding
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
