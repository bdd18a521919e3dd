//! # Tinyseed: seed nodes for a whole chain directory
//!
//! Tinyseed reads the list of chains published by a chain directory and runs
//! one seed-mode peer exchange node per chain, each on its own port with its
//! own node key and address book.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tinyseed::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = BaseSettings::default();
//!     let directory = HttpChainDirectory::new(
//!         &settings.registry_url,
//!         settings.registry_timeout(),
//!         settings.registry_retries,
//!     )?;
//!
//!     let shutdown = Shutdown::new();
//!     let orchestrator = Orchestrator::new(settings, Arc::new(directory), shutdown.clone());
//!     let report = orchestrator.run().await?;
//!     println!("{} chains, {} failed", report.launched(), report.failed());
//!     Ok(())
//! }
//! ```
//!
//! ## Crates
//!
//! - [`config`]: process settings and per-chain `config.toml`
//! - [`network`]: node keys, address book, transport, switch and PEX reactor
//! - [`registry`]: chain directory client
//! - [`node`]: provisioning, supervisors and the orchestrator

pub use tinyseed_config as config;
pub use tinyseed_network as network;
pub use tinyseed_node as node;
pub use tinyseed_registry as registry;

/// Commonly used types
pub mod prelude {
    pub use crate::config::{BaseSettings, SeedConfig};
    pub use crate::network::{AddrBook, NodeKey, PeerCounts, Switch};
    pub use crate::node::{
        ChainProvisioner, Orchestrator, OrchestratorReport, SeedError, SeedNode, Shutdown,
        StatusBoard, SupervisorState,
    };
    pub use crate::registry::{ChainDirectory, HttpChainDirectory, RegistryError};
}

/// Tinyseed library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
