//! Tinyseed node
//!
//! Runs a seed node for every chain a chain directory lists. Each chain is
//! isolated: its own port, home directory, node key, address book and task,
//! so a chain that cannot start never takes the others down.

pub mod error;
pub mod orchestrator;
pub mod peers;
pub mod provision;
pub mod shutdown;
pub mod status;
pub mod supervisor;

pub use error::{ProvisioningError, SeedError};
pub use orchestrator::{ChainOutcome, Orchestrator, OrchestratorReport};
pub use peers::validate_and_format;
pub use provision::{ChainProvisioner, ProvisionedChain};
pub use shutdown::Shutdown;
pub use status::{StatusBoard, SupervisorState};
pub use supervisor::{HealthReport, SeedNode, SupervisorSettings};
