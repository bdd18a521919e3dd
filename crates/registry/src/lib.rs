//! Chain directory client
//!
//! Lists the chains published by a chain directory such as
//! <https://cosmos-chain.directory> and fetches each chain's descriptor with
//! its persistent peers.

mod client;
mod error;
pub mod models;

pub use client::{ChainDirectory, HttpChainDirectory, BASE_RETRY_DELAY};
pub use error::{RegistryError, RegistryResult};
pub use models::{ChainDescriptor, ChainList, PeerSet, RawPeer};
