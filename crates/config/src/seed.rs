//! Per-chain seed configuration.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const TCP_SCHEME: &str = "tcp://";

/// Configuration of a single chain's seed node.
///
/// Field names follow the `config.toml` written into every chain's home
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Address to listen for incoming connections
    #[serde(rename = "laddr")]
    pub listen_address: String,
    /// Network identifier
    pub chain_id: String,
    /// Path to the node key, relative to the chain home or absolute
    pub node_key_file: String,
    /// Path to the address book, relative to the chain home or absolute
    pub addr_book_file: String,
    /// Strict routability rules for the address book
    pub addr_book_strict: bool,
    /// Maximum number of inbound connections
    pub max_num_inbound_peers: usize,
    /// Maximum number of outbound connections
    pub max_num_outbound_peers: usize,
    /// Seed nodes used to discover peers
    pub seeds: Vec<String>,
    /// Peers we always keep connected to
    pub persistent_peers: Vec<String>,
}

impl SeedConfig {
    /// Parsed listen address
    pub fn listen_addr(&self) -> ConfigResult<ListenAddr> {
        self.listen_address.parse()
    }

    /// Writes the configuration as TOML
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads a configuration previously written by [`SeedConfig::save`]
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A `tcp://host:port` listen address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenAddr {
    pub host: String,
    pub port: u16,
}

impl ListenAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` without scheme, suitable for socket APIs
    pub fn socket_string(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", TCP_SCHEME, self.socket_string())
    }
}

impl FromStr for ListenAddr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidListenAddress(s.to_string());
        let rest = s.strip_prefix(TCP_SCHEME).unwrap_or(s);
        let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BaseSettings;
    use tempfile::TempDir;

    #[test]
    fn test_listen_addr_parse() {
        let addr: ListenAddr = "tcp://0.0.0.0:9000".parse().unwrap();
        assert_eq!(addr, ListenAddr::new("0.0.0.0", 9000));
        assert_eq!(addr.socket_string(), "0.0.0.0:9000");
        assert_eq!(addr.to_string(), "tcp://0.0.0.0:9000");

        let bare: ListenAddr = "127.0.0.1:26656".parse().unwrap();
        assert_eq!(bare.port, 26656);

        let v6: ListenAddr = "tcp://[::1]:9001".parse().unwrap();
        assert_eq!(v6.host, "::1");
        assert_eq!(v6.socket_string(), "[::1]:9001");
    }

    #[test]
    fn test_listen_addr_rejects_garbage() {
        for input in ["tcp://0.0.0.0", "tcp://:9000", "0.0.0.0:port", "0.0.0.0:70000"] {
            assert!(input.parse::<ListenAddr>().is_err(), "{input} should not parse");
        }
    }

    #[test]
    fn test_config_toml_keys() {
        let config = BaseSettings::default()
            .seed_config("juno-1", 0, vec!["id@host:26656".to_string()])
            .unwrap();
        let content = toml::to_string_pretty(&config).unwrap();

        assert!(content.contains("laddr = \"tcp://0.0.0.0:9000\""));
        assert!(content.contains("chain_id = \"juno-1\""));
        assert!(content.contains("max_num_inbound_peers = 3000"));
        assert!(content.contains("addr_book_strict = true"));
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let config = BaseSettings::default()
            .seed_config("akashnet-2", 5, Vec::new())
            .unwrap();

        config.save(&path).unwrap();
        let loaded = SeedConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.listen_addr().unwrap().port, 9005);
    }
}
