//! Network error types.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the peer exchange layer
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("node key {path}: {reason}")]
    NodeKey { path: PathBuf, reason: String },

    #[error("handshake with {address} failed: {reason}")]
    Handshake { address: SocketAddr, reason: String },

    #[error("incompatible peer: {0}")]
    Incompatible(String),

    #[error("message codec error: {0}")]
    Codec(String),

    #[error("connection to {address} timed out after {timeout_ms}ms")]
    Timeout { address: String, timeout_ms: u64 },

    #[error("address book {path}: {reason}")]
    AddrBook { path: PathBuf, reason: String },

    #[error("address {0} is not routable")]
    NonRoutable(String),

    #[error("switch already started")]
    AlreadyStarted,
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        NetworkError::Codec(err.to_string())
    }
}

/// Result type for network operations
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;
