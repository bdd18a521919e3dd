//! Per-chain home directories and node keys.
//!
//! Layout: `{home_root}/{chain_id}/{config.toml,node_key.json,addrbook.json}`.

use crate::error::ProvisioningError;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tinyseed_config::{BaseSettings, SeedConfig, CONFIG_FILE_NAME};
use tinyseed_network::NodeKey;
use tracing::debug;

/// Everything a seed node needs from disk
#[derive(Debug)]
pub struct ProvisionedChain {
    pub chain_id: String,
    pub home: PathBuf,
    pub config_file: PathBuf,
    pub node_key_file: PathBuf,
    pub addr_book_file: PathBuf,
    pub node_key: NodeKey,
}

/// Prepares chain home directories under one root
#[derive(Debug, Clone)]
pub struct ChainProvisioner {
    home_root: PathBuf,
}

impl ChainProvisioner {
    pub fn new(home_root: impl Into<PathBuf>) -> Self {
        Self {
            home_root: home_root.into(),
        }
    }

    pub fn from_settings(settings: &BaseSettings) -> Self {
        Self::new(settings.home_root.clone())
    }

    pub fn home_root(&self) -> &Path {
        &self.home_root
    }

    /// Absolute home directory of `chain_id`. Ids that would escape the root
    /// or span several directories are refused.
    pub fn home_for(&self, chain_id: &str) -> Result<PathBuf, ProvisioningError> {
        let mut components = Path::new(chain_id).components();
        let single_name = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_name || chain_id.contains(&['/', '\\'][..]) {
            return Err(ProvisioningError::InvalidChainId(chain_id.to_string()));
        }

        let root = if self.home_root.is_absolute() {
            self.home_root.clone()
        } else {
            std::env::current_dir()
                .map_err(|source| ProvisioningError::CreateDir {
                    path: self.home_root.clone(),
                    source,
                })?
                .join(&self.home_root)
        };
        Ok(root.join(chain_id))
    }

    /// Creates the chain's home, writes its `config.toml` and loads or
    /// generates its node key
    pub fn provision(&self, config: &SeedConfig) -> Result<ProvisionedChain, ProvisioningError> {
        let home = self.home_for(&config.chain_id)?;
        create_private_dir(&home)?;

        let config_file = home.join(CONFIG_FILE_NAME);
        config.save(&config_file)?;

        let node_key_file = home.join(&config.node_key_file);
        let addr_book_file = home.join(&config.addr_book_file);
        let node_key =
            NodeKey::load_or_generate(&node_key_file).map_err(ProvisioningError::NodeKey)?;

        debug!(
            chain = %config.chain_id,
            home = %home.display(),
            id = %node_key.id(),
            "provisioned chain"
        );

        Ok(ProvisionedChain {
            chain_id: config.chain_id.clone(),
            home,
            config_file,
            node_key_file,
            addr_book_file,
            node_key,
        })
    }
}

fn create_private_dir(path: &Path) -> Result<(), ProvisioningError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(path)
        .map_err(|source| ProvisioningError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
}
