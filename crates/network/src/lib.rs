//! Tinyseed peer exchange layer
//!
//! The minimal slice of a Tendermint-style P2P stack a seed node needs:
//! persistent node keys, a strict address book, a listening transport with
//! a node-info handshake and a switch running the peer exchange reactor in
//! seed mode.

pub mod addrbook;
pub mod address;
pub mod error;
pub mod key;
pub mod node_info;
pub mod p2p;

pub use addrbook::{AddrBook, KnownAddress};
pub use address::NetAddress;
pub use error::{NetworkError, NetworkResult};
pub use key::{NodeId, NodeKey};
pub use node_info::{NodeInfo, ProtocolVersion};
pub use p2p::{
    Connection, Message, PeerCounts, PexConfig, PexReactor, Switch, SwitchConfig, Transport,
};

/// Channel id of the peer exchange reactor
pub const PEX_CHANNEL: u8 = 0x00;

/// Protocol versions announced in the handshake
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(8, 11, 0);

/// Software version announced in the handshake
pub const NODE_VERSION: &str = "0.6.9";
