//! Peer exchange reactor.
//!
//! Answers address requests from the address book and feeds addresses
//! received from peers back into it. In seed mode every peer is dropped once
//! `seed_disconnect_wait_period` has elapsed so connection slots keep turning
//! over and the crawl reaches as many nodes as possible.

use super::{Message, BASE_DIAL_BACKOFF, DEFAULT_SEED_DISCONNECT_WAIT, MAX_ADDRS_PER_MESSAGE};
use crate::{AddrBook, NetAddress, NetworkError};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Back-off exponent is capped to keep the delay representable
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Peer exchange settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PexConfig {
    /// Crawl the network and hang up on peers after a short while
    pub seed_mode: bool,

    /// `id@host:port` addresses dialed at startup
    pub seeds: Vec<String>,

    /// How long a seed keeps a peer before disconnecting it
    pub seed_disconnect_wait_period: Duration,

    /// Ceiling of the dial back-off. Zero means no ceiling.
    pub persistent_peers_max_dial_period: Duration,
}

impl Default for PexConfig {
    fn default() -> Self {
        Self {
            seed_mode: false,
            seeds: Vec::new(),
            seed_disconnect_wait_period: DEFAULT_SEED_DISCONNECT_WAIT,
            persistent_peers_max_dial_period: Duration::ZERO,
        }
    }
}

/// Peer exchange over the address book of one chain
#[derive(Debug)]
pub struct PexReactor {
    config: PexConfig,
    book: Arc<AddrBook>,
    seeds: Vec<NetAddress>,
}

impl PexReactor {
    /// Creates the reactor. Seeds that do not parse are logged and skipped.
    pub fn new(book: Arc<AddrBook>, config: PexConfig) -> Self {
        let seeds = config
            .seeds
            .iter()
            .filter_map(|seed| match seed.parse::<NetAddress>() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    warn!(%seed, "ignoring seed: {}", e);
                    None
                }
            })
            .collect();

        Self {
            config,
            book,
            seeds,
        }
    }

    pub fn config(&self) -> &PexConfig {
        &self.config
    }

    pub fn book(&self) -> &Arc<AddrBook> {
        &self.book
    }

    /// Seeds that parsed
    pub fn seeds(&self) -> &[NetAddress] {
        &self.seeds
    }

    pub fn is_seed_mode(&self) -> bool {
        self.config.seed_mode
    }

    /// How long a peer stays connected; `None` keeps it until it leaves
    pub fn peer_lifetime(&self) -> Option<Duration> {
        self.config
            .seed_mode
            .then_some(self.config.seed_disconnect_wait_period)
    }

    /// Delay before the `attempt`-th retry: exponential with up to one
    /// second of jitter, capped by `persistent_peers_max_dial_period` when
    /// that is non-zero.
    pub fn dial_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..1000));
        let delay = BASE_DIAL_BACKOFF * 2u32.pow(exponent) + jitter;

        let ceiling = self.config.persistent_peers_max_dial_period;
        if ceiling.is_zero() {
            delay
        } else {
            delay.min(ceiling)
        }
    }

    /// Message asking a peer for its addresses
    pub fn request(&self) -> Message {
        Message::PexRequest
    }

    /// Handles a message from peer `src`, returning the reply if any
    pub fn receive(&self, src: &NetAddress, message: Message) -> Option<Message> {
        match message {
            Message::PexRequest => Some(Message::PexAddrs {
                addrs: self.book.selection(MAX_ADDRS_PER_MESSAGE),
            }),
            Message::PexAddrs { addrs } => {
                let total = addrs.len();
                let src_label = src.to_string();
                let mut added = 0usize;
                for addr in addrs.into_iter().take(MAX_ADDRS_PER_MESSAGE) {
                    match self.book.add_address(addr, &src_label) {
                        Ok(true) => added += 1,
                        Ok(false) => {}
                        Err(NetworkError::NonRoutable(addr)) => {
                            debug!(%src, %addr, "skipping non-routable address")
                        }
                        Err(e) => debug!(%src, "rejected address: {}", e),
                    }
                }
                debug!(%src, total, added, book_size = self.book.size(), "received addresses");
                None
            }
            Message::Handshake { .. } => {
                debug!(%src, "unexpected handshake after connection setup");
                None
            }
        }
    }
}
