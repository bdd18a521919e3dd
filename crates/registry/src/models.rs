//! Chain directory response bodies.

use serde::{Deserialize, Serialize};

/// Body of `GET /chains`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainList {
    #[serde(default)]
    pub chains: Vec<String>,
}

/// Body of `GET /chains/{id}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub chain_id: String,

    #[serde(default)]
    pub peers: PeerSet,
}

impl ChainDescriptor {
    /// Persistent peers as listed by the registry, unvalidated
    pub fn raw_peers(&self) -> &[RawPeer] {
        &self.peers.persistent_peers
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSet {
    #[serde(default)]
    pub persistent_peers: Vec<RawPeer>,
}

/// Peer entry as published: a node id and a `host:port` address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPeer {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub address: String,
}

impl RawPeer {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}
