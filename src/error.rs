//! Error types for the VDR client.

use crate::transport::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VdrError {
    /// A value has no wire type tag (empty or mixed list, float, struct, ...).
    #[error("Cannot infer wire type of {value} ({shape})")]
    TypeInference { value: String, shape: String },

    #[error("Failed to bind {path} on {bus_name}: {source}")]
    Binding {
        bus_name: String,
        path: String,
        #[source]
        source: TransportError,
    },

    /// The remote answered with a failure response code.
    #[error("{message}")]
    Remote { code: i32, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Index {index} out of range (length {len})")]
    IndexOutOfRange { index: i32, len: i32 },

    /// The named interface is not bound yet because VDR has not been seen running.
    #[error("Interface {0} is not available before VDR becomes ready")]
    NotInitialized(&'static str),

    #[error("Unexpected reply from {context}: {reason}")]
    Decode { context: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl VdrError {
    pub(crate) fn decode(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Response code of a remote failure, if this is one.
    pub fn remote_code(&self) -> Option<i32> {
        match self {
            Self::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}
