//! Node information exchanged during the handshake.

use crate::{NetworkError, NetworkResult, NodeId};
use serde::{Deserialize, Serialize};

/// Protocol versions announced by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub p2p: u64,
    pub block: u64,
    pub app: u64,
}

impl ProtocolVersion {
    pub const fn new(p2p: u64, block: u64, app: u64) -> Self {
        Self { p2p, block, app }
    }
}

/// Self-description sent to every peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub protocol_version: ProtocolVersion,
    pub id: NodeId,
    /// Address the node accepts connections on
    pub listen_addr: String,
    /// Chain the node belongs to
    pub network: String,
    /// Software version
    pub version: String,
    /// Channels the node speaks
    pub channels: Vec<u8>,
    pub moniker: String,
}

impl NodeInfo {
    /// Checks the fields a peer must fill in
    pub fn validate(&self) -> NetworkResult<()> {
        if self.network.is_empty() {
            return Err(NetworkError::Incompatible("empty network".to_string()));
        }
        if self.channels.is_empty() {
            return Err(NetworkError::Incompatible("no channels".to_string()));
        }
        Ok(())
    }

    /// Checks that `other` can talk to us: same block protocol, same
    /// network and at least one common channel.
    pub fn compatible_with(&self, other: &NodeInfo) -> NetworkResult<()> {
        other.validate()?;

        if self.protocol_version.block != other.protocol_version.block {
            return Err(NetworkError::Incompatible(format!(
                "block protocol {} != {}",
                other.protocol_version.block, self.protocol_version.block
            )));
        }
        if self.network != other.network {
            return Err(NetworkError::Incompatible(format!(
                "peer is on network {}, we are on {}",
                other.network, self.network
            )));
        }
        if !self.channels.iter().any(|c| other.channels.contains(c)) {
            return Err(NetworkError::Incompatible(format!(
                "no common channels: ours {:?}, theirs {:?}",
                self.channels, other.channels
            )));
        }
        Ok(())
    }

    /// Port taken from the announced listen address
    pub fn listen_port(&self) -> Option<u16> {
        self.listen_addr.rsplit_once(':')?.1.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeKey, PEX_CHANNEL, PROTOCOL_VERSION};

    fn info(network: &str) -> NodeInfo {
        NodeInfo {
            protocol_version: PROTOCOL_VERSION,
            id: NodeKey::generate().id(),
            listen_addr: "tcp://0.0.0.0:9000".to_string(),
            network: network.to_string(),
            version: "0.1.0".to_string(),
            channels: vec![PEX_CHANNEL],
            moniker: format!("{network}-seed"),
        }
    }

    #[test]
    fn test_compatible_peers() {
        assert!(info("cosmoshub-4").compatible_with(&info("cosmoshub-4")).is_ok());
    }

    #[test]
    fn test_network_mismatch() {
        let result = info("cosmoshub-4").compatible_with(&info("osmosis-1"));
        assert!(matches!(result, Err(NetworkError::Incompatible(_))));
    }

    #[test]
    fn test_block_version_and_channels() {
        let ours = info("juno-1");

        let mut other = info("juno-1");
        other.protocol_version.block += 1;
        assert!(ours.compatible_with(&other).is_err());

        let mut other = info("juno-1");
        other.channels = vec![0x20];
        assert!(ours.compatible_with(&other).is_err());

        let mut other = info("juno-1");
        other.channels.clear();
        assert!(ours.compatible_with(&other).is_err());
    }

    #[test]
    fn test_listen_port() {
        assert_eq!(info("x").listen_port(), Some(9000));
        let mut bad = info("x");
        bad.listen_addr = "nowhere".to_string();
        assert_eq!(bad.listen_port(), None);
    }
}
