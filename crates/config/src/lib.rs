//! Tinyseed Configuration Module
//!
//! This module provides the process-wide [`BaseSettings`] shared by every chain
//! and the per-chain [`SeedConfig`] derived from them.

mod error;
mod seed;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use seed::{ListenAddr, SeedConfig};
pub use settings::BaseSettings;

/// Default chain registry endpoint
pub const DEFAULT_REGISTRY_URL: &str = "https://cosmos-chain.directory";

/// Default listen host for every seed
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";

/// First port handed out; chain `i` listens on `DEFAULT_BASE_PORT + i`
pub const DEFAULT_BASE_PORT: u16 = 9000;

/// Peer limits
pub const DEFAULT_MAX_INBOUND_PEERS: usize = 3000;
pub const DEFAULT_MAX_OUTBOUND_PEERS: usize = 100;

/// Name of the directory created under the user's home
pub const HOME_DIR_NAME: &str = ".tinyseed";

/// Per-chain file names
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const NODE_KEY_FILE_NAME: &str = "node_key.json";
pub const ADDR_BOOK_FILE_NAME: &str = "addrbook.json";

/// Timing defaults
pub const DEFAULT_REGISTRY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REGISTRY_RETRIES: u32 = 2;
pub const DEFAULT_LAUNCH_STAGGER_MS: u64 = 1000;
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 5;
/// Seeds drop crawled peers quickly to harvest as many addresses as possible
pub const DEFAULT_SEED_DISCONNECT_WAIT_SECS: u64 = 5;
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 20;
