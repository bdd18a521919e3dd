//! Process-wide settings.
//!
//! One [`BaseSettings`] value is loaded at startup (optionally from a TOML
//! file) and every chain's [`SeedConfig`] is derived from it.

use crate::{
    ConfigError, ConfigResult, ListenAddr, SeedConfig, ADDR_BOOK_FILE_NAME,
    DEFAULT_BASE_PORT, DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_HEALTH_INTERVAL_SECS,
    DEFAULT_LAUNCH_STAGGER_MS, DEFAULT_LISTEN_HOST, DEFAULT_MAX_INBOUND_PEERS,
    DEFAULT_MAX_OUTBOUND_PEERS, DEFAULT_REGISTRY_RETRIES, DEFAULT_REGISTRY_TIMEOUT_SECS,
    DEFAULT_REGISTRY_URL, DEFAULT_SEED_DISCONNECT_WAIT_SECS, HOME_DIR_NAME, NODE_KEY_FILE_NAME,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings shared by every chain the process seeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseSettings {
    /// Chain registry base URL
    pub registry_url: String,
    /// Request timeout for registry calls
    pub registry_timeout_secs: u64,
    /// Retries on transport errors and 5xx responses
    pub registry_retries: u32,
    /// Host every seed binds to
    pub listen_host: String,
    /// Port of the first chain; later chains count up from here
    pub base_port: u16,
    /// Maximum number of inbound connections per chain
    pub max_num_inbound_peers: usize,
    /// Maximum number of outbound connections per chain
    pub max_num_outbound_peers: usize,
    /// Strict routability rules for the address book.
    /// Set false for private or local networks.
    pub addr_book_strict: bool,
    /// Root under which `{chain_id}/` directories are created
    pub home_root: PathBuf,
    /// Delay between two chain launches
    pub launch_stagger_ms: u64,
    /// Interval between two peer count reports
    pub health_interval_secs: u64,
    /// How long a seed keeps a crawled peer before hanging up
    pub seed_disconnect_wait_secs: u64,
    /// Handshake deadline for inbound and outbound connections
    pub handshake_timeout_secs: u64,
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for BaseSettings {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            registry_timeout_secs: DEFAULT_REGISTRY_TIMEOUT_SECS,
            registry_retries: DEFAULT_REGISTRY_RETRIES,
            listen_host: DEFAULT_LISTEN_HOST.to_string(),
            base_port: DEFAULT_BASE_PORT,
            max_num_inbound_peers: DEFAULT_MAX_INBOUND_PEERS,
            max_num_outbound_peers: DEFAULT_MAX_OUTBOUND_PEERS,
            addr_book_strict: true,
            home_root: default_home_root(),
            launch_stagger_ms: DEFAULT_LAUNCH_STAGGER_MS,
            health_interval_secs: DEFAULT_HEALTH_INTERVAL_SECS,
            seed_disconnect_wait_secs: DEFAULT_SEED_DISCONNECT_WAIT_SECS,
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            log_level: "info".to_string(),
        }
    }
}

/// `~/.tinyseed`, or `./.tinyseed` when no home directory can be found
fn default_home_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(HOME_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(HOME_DIR_NAME))
}

impl BaseSettings {
    /// Loads settings from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates the settings
    pub fn validate(&self) -> ConfigResult<()> {
        if self.registry_url.is_empty() {
            return Err(ConfigError::Invalid("registry_url cannot be empty".to_string()));
        }
        if self.listen_host.is_empty() {
            return Err(ConfigError::Invalid("listen_host cannot be empty".to_string()));
        }
        if self.max_num_outbound_peers == 0 {
            return Err(ConfigError::Invalid(
                "max_num_outbound_peers must be greater than 0".to_string(),
            ));
        }
        if self.health_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "health_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.handshake_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "handshake_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Port assigned to the chain at `index` in the chain list
    pub fn port_for(&self, index: usize) -> ConfigResult<u16> {
        u16::try_from(index)
            .ok()
            .and_then(|offset| self.base_port.checked_add(offset))
            .ok_or(ConfigError::PortOverflow {
                base: self.base_port,
                offset: index,
            })
    }

    /// Derives the configuration of the chain at `index`
    pub fn seed_config(
        &self,
        chain_id: &str,
        index: usize,
        seeds: Vec<String>,
    ) -> ConfigResult<SeedConfig> {
        let listen = ListenAddr::new(self.listen_host.clone(), self.port_for(index)?);
        Ok(SeedConfig {
            listen_address: listen.to_string(),
            chain_id: chain_id.to_string(),
            node_key_file: NODE_KEY_FILE_NAME.to_string(),
            addr_book_file: ADDR_BOOK_FILE_NAME.to_string(),
            addr_book_strict: self.addr_book_strict,
            max_num_inbound_peers: self.max_num_inbound_peers,
            max_num_outbound_peers: self.max_num_outbound_peers,
            seeds,
            persistent_peers: Vec::new(),
        })
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }

    pub fn launch_stagger(&self) -> Duration {
        Duration::from_millis(self.launch_stagger_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn seed_disconnect_wait(&self) -> Duration {
        Duration::from_secs(self.seed_disconnect_wait_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = BaseSettings::default();
        assert_eq!(settings.base_port, 9000);
        assert_eq!(settings.max_num_inbound_peers, 3000);
        assert_eq!(settings.max_num_outbound_peers, 100);
        assert!(settings.addr_book_strict);
        assert!(settings.home_root.ends_with(HOME_DIR_NAME));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_ports_count_up_from_base() {
        let settings = BaseSettings::default();
        let ports: Vec<u16> = (0..4).map(|i| settings.port_for(i).unwrap()).collect();
        assert_eq!(ports, vec![9000, 9001, 9002, 9003]);
    }

    #[test]
    fn test_port_overflow() {
        let settings = BaseSettings {
            base_port: u16::MAX,
            ..Default::default()
        };
        assert!(settings.port_for(0).is_ok());
        assert!(matches!(
            settings.port_for(1),
            Err(ConfigError::PortOverflow { .. })
        ));
    }

    #[test]
    fn test_seed_config_derivation() {
        let settings = BaseSettings::default();
        let config = settings
            .seed_config("cosmoshub-4", 2, vec!["abc@1.2.3.4:26656".to_string()])
            .unwrap();

        assert_eq!(config.listen_address, "tcp://0.0.0.0:9002");
        assert_eq!(config.chain_id, "cosmoshub-4");
        assert_eq!(config.node_key_file, "node_key.json");
        assert_eq!(config.addr_book_file, "addrbook.json");
        assert_eq!(config.seeds.len(), 1);
        assert!(config.persistent_peers.is_empty());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tinyseed.toml");
        std::fs::write(
            &path,
            "base_port = 12000\naddr_book_strict = false\nhome_root = \"/tmp/seeds\"\n",
        )
        .unwrap();

        let settings = BaseSettings::load(&path).unwrap();
        assert_eq!(settings.base_port, 12000);
        assert!(!settings.addr_book_strict);
        assert_eq!(settings.home_root, PathBuf::from("/tmp/seeds"));
        assert_eq!(settings.max_num_inbound_peers, DEFAULT_MAX_INBOUND_PEERS);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tinyseed.toml");
        std::fs::write(&path, "max_num_outbound_peers = 0\n").unwrap();
        assert!(matches!(
            BaseSettings::load(&path),
            Err(ConfigError::Invalid(_))
        ));

        std::fs::write(&path, "base_port = \"nope\"\n").unwrap();
        assert!(matches!(
            BaseSettings::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = BaseSettings::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
