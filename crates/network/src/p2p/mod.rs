//! Seed-mode peer exchange.
//!
//! The implementation is split into modules:
//! - config: switch limits and timings
//! - connection: newline-delimited JSON framing of [`Message`]s
//! - transport: listening socket, dialing and the handshake
//! - pex: the peer exchange reactor (address requests and crawling policy)
//! - switch: owns the transport and every peer, exposes peer counts

pub mod config;
pub mod connection;
pub mod pex;
pub mod switch;
pub mod transport;

pub use config::SwitchConfig;
pub use connection::{Connection, Message};
pub use pex::{PexConfig, PexReactor};
pub use switch::{PeerCounts, Switch};
pub use transport::Transport;

use std::time::Duration;

/// Largest accepted frame, in bytes
pub const MAX_MESSAGE_SIZE: usize = 1 << 20;

/// Maximum number of addresses sent or accepted in one PEX message
pub const MAX_ADDRS_PER_MESSAGE: usize = 250;

pub const HANDSHAKE_TIMEOUT_SECS: u64 = 20;
pub const DIAL_TIMEOUT_SECS: u64 = 3;

/// How often the crawler tops up outbound connections
pub const ENSURE_PEERS_PERIOD: Duration = Duration::from_secs(30);

/// An address is not re-dialed by the crawler within this window
pub const RECRAWL_INTERVAL: Duration = Duration::from_secs(120);

/// How often the address book is flushed to disk
pub const ADDR_BOOK_SAVE_PERIOD: Duration = Duration::from_secs(120);

/// Default time a seed keeps a peer before hanging up
pub const DEFAULT_SEED_DISCONNECT_WAIT: Duration = Duration::from_secs(28 * 60 * 60);

/// First back-off step when dialing seeds
pub const BASE_DIAL_BACKOFF: Duration = Duration::from_secs(1);
