//! Switch configuration and settings.

use super::{
    ADDR_BOOK_SAVE_PERIOD, DIAL_TIMEOUT_SECS, ENSURE_PEERS_PERIOD, HANDSHAKE_TIMEOUT_SECS,
    RECRAWL_INTERVAL,
};
use std::time::Duration;

/// Limits and timings of a [`Switch`](super::Switch)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchConfig {
    /// Maximum number of inbound peers
    pub max_num_inbound_peers: usize,

    /// Maximum number of outbound peers, dials in flight included
    pub max_num_outbound_peers: usize,

    /// Deadline for the node info exchange
    pub handshake_timeout: Duration,

    /// Deadline for establishing a TCP connection
    pub dial_timeout: Duration,

    /// Interval between two crawl rounds
    pub ensure_peers_period: Duration,

    /// Minimum time between two dials of the same address
    pub recrawl_interval: Duration,

    /// Interval between two address book flushes
    pub addr_book_save_period: Duration,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            max_num_inbound_peers: 40,
            max_num_outbound_peers: 10,
            handshake_timeout: Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
            dial_timeout: Duration::from_secs(DIAL_TIMEOUT_SECS),
            ensure_peers_period: ENSURE_PEERS_PERIOD,
            recrawl_interval: RECRAWL_INTERVAL,
            addr_book_save_period: ADDR_BOOK_SAVE_PERIOD,
        }
    }
}

impl SwitchConfig {
    /// Creates a new switch configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the peer limits
    pub fn with_peer_limits(mut self, max_inbound: usize, max_outbound: usize) -> Self {
        self.max_num_inbound_peers = max_inbound;
        self.max_num_outbound_peers = max_outbound;
        self
    }

    /// Sets the handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the dial timeout
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Sets the crawl period
    pub fn with_ensure_peers_period(mut self, period: Duration) -> Self {
        self.ensure_peers_period = period;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_num_outbound_peers == 0 {
            return Err("max_num_outbound_peers must be greater than 0".to_string());
        }

        if self.handshake_timeout.is_zero() {
            return Err("handshake_timeout must be greater than 0".to_string());
        }

        if self.dial_timeout.is_zero() {
            return Err("dial_timeout must be greater than 0".to_string());
        }

        if self.ensure_peers_period.is_zero() || self.addr_book_save_period.is_zero() {
            return Err("periods must be greater than 0".to_string());
        }

        Ok(())
    }
}
