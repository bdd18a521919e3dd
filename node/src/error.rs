//! Chain-scoped errors.
//!
//! Nothing in here is fatal to the process: every variant names the chain it
//! belongs to and ends up in the orchestrator's report.

use std::path::PathBuf;
use thiserror::Error;
use tinyseed_config::ConfigError;
use tinyseed_network::NetworkError;
use tinyseed_registry::RegistryError;

/// Failures while preparing a chain's home directory
#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("chain id '{0}' cannot be used as a directory name")]
    InvalidChainId(String),

    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write chain config: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to load node key: {0}")]
    NodeKey(#[source] NetworkError),
}

/// Reasons a chain's seed node did not reach or left `Running`
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("[{chain_id}] registry lookup failed: {source}")]
    Registry {
        chain_id: String,
        #[source]
        source: RegistryError,
    },

    #[error("[{chain_id}] invalid configuration: {source}")]
    Config {
        chain_id: String,
        #[source]
        source: ConfigError,
    },

    #[error("[{chain_id}] provisioning failed: {source}")]
    Provisioning {
        chain_id: String,
        #[source]
        source: ProvisioningError,
    },

    #[error("[{chain_id}] cannot listen on {address}: {source}")]
    Bind {
        chain_id: String,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[{chain_id}] address book unavailable: {source}")]
    AddrBook {
        chain_id: String,
        #[source]
        source: NetworkError,
    },

    #[error("[{chain_id}] switch failed: {source}")]
    Switch {
        chain_id: String,
        #[source]
        source: NetworkError,
    },

    #[error("[{chain_id}] seed task aborted: {reason}")]
    Aborted { chain_id: String, reason: String },
}

impl SeedError {
    /// Chain the error belongs to
    pub fn chain_id(&self) -> &str {
        match self {
            SeedError::Registry { chain_id, .. }
            | SeedError::Config { chain_id, .. }
            | SeedError::Provisioning { chain_id, .. }
            | SeedError::Bind { chain_id, .. }
            | SeedError::AddrBook { chain_id, .. }
            | SeedError::Switch { chain_id, .. }
            | SeedError::Aborted { chain_id, .. } => chain_id,
        }
    }

    /// Maps a transport error, keeping bind failures distinct
    pub(crate) fn from_listen(chain_id: &str, err: NetworkError) -> Self {
        match err {
            NetworkError::Bind { address, source } => SeedError::Bind {
                chain_id: chain_id.to_string(),
                address,
                source,
            },
            other => SeedError::Switch {
                chain_id: chain_id.to_string(),
                source: other,
            },
        }
    }
}
