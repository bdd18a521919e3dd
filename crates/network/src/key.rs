//! Node identity.
//!
//! A node is identified by an Ed25519 key. Its [`NodeId`] is the lowercase
//! hex encoding of the first 20 bytes of the SHA-256 digest of the public key.
//! Keys are persisted as JSON:
//!
//! ```json
//! {"priv_key": {"type": "tendermint/PrivKeyEd25519", "value": "<base64 secret||public>"}}
//! ```

use crate::{NetworkError, NetworkResult};
use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Length of a node id in bytes
pub const NODE_ID_BYTE_LENGTH: usize = 20;

const PRIV_KEY_TYPE: &str = "tendermint/PrivKeyEd25519";

/// Hex-encoded node identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Derives the id of a public key
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        Self(hex::encode(&digest[..NODE_ID_BYTE_LENGTH]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| NetworkError::InvalidAddress {
            address: s.to_string(),
            reason: reason.to_string(),
        };
        let bytes = hex::decode(s).map_err(|_| invalid("node id is not hex"))?;
        if bytes.len() != NODE_ID_BYTE_LENGTH {
            return Err(invalid("node id must be 20 bytes"));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for NodeId {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

#[derive(Serialize, Deserialize)]
struct NodeKeyFile {
    priv_key: PrivKeyJson,
}

#[derive(Serialize, Deserialize)]
struct PrivKeyJson {
    #[serde(rename = "type")]
    key_type: String,
    value: String,
}

/// The persistent Ed25519 key of a node
#[derive(Clone)]
pub struct NodeKey {
    signing_key: SigningKey,
}

impl NodeKey {
    /// Generates a fresh key
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Id derived from the public key
    pub fn id(&self) -> NodeId {
        NodeId::from_public_key(&self.public_key())
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Loads the key at `path`, or generates and persists one if the file
    /// does not exist. Repeated calls for the same path return the same key.
    pub fn load_or_generate(path: &Path) -> NetworkResult<Self> {
        if path.exists() {
            let key = Self::load(path)?;
            debug!(path = %path.display(), id = %key.id(), "loaded node key");
            return Ok(key);
        }

        let key = Self::generate();
        key.save(path)?;
        info!(path = %path.display(), id = %key.id(), "generated new node key");
        Ok(key)
    }

    /// Loads a key file
    pub fn load(path: &Path) -> NetworkResult<Self> {
        let key_error = |reason: String| NetworkError::NodeKey {
            path: path.to_path_buf(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| key_error(e.to_string()))?;
        let file: NodeKeyFile =
            serde_json::from_str(&content).map_err(|e| key_error(format!("malformed: {e}")))?;
        if file.priv_key.key_type != PRIV_KEY_TYPE {
            return Err(key_error(format!(
                "unsupported key type {}",
                file.priv_key.key_type
            )));
        }

        let raw = general_purpose::STANDARD
            .decode(file.priv_key.value.as_bytes())
            .map_err(|e| key_error(format!("invalid base64: {e}")))?;
        let keypair: [u8; 64] = raw
            .as_slice()
            .try_into()
            .map_err(|_| key_error(format!("expected 64 key bytes, found {}", raw.len())))?;
        let signing_key = SigningKey::from_keypair_bytes(&keypair)
            .map_err(|e| key_error(format!("inconsistent keypair: {e}")))?;

        Ok(Self { signing_key })
    }

    /// Writes the key file, readable by the owner only
    pub fn save(&self, path: &Path) -> NetworkResult<()> {
        let file = NodeKeyFile {
            priv_key: PrivKeyJson {
                key_type: PRIV_KEY_TYPE.to_string(),
                value: general_purpose::STANDARD.encode(self.signing_key.to_keypair_bytes()),
            },
        };
        let content = serde_json::to_vec(&file)?;

        let mut options = fs::OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let write = || -> std::io::Result<()> {
            let mut out = options.open(path)?;
            out.write_all(&content)?;
            out.sync_all()
        };
        write().map_err(|e| NetworkError::NodeKey {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeKey").field("id", &self.id()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_node_id_format() {
        let key = NodeKey::generate();
        let id = key.id();
        assert_eq!(id.as_str().len(), NODE_ID_BYTE_LENGTH * 2);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id.as_str().parse::<NodeId>().unwrap(), id);
    }

    #[test]
    fn test_node_id_rejects_bad_input() {
        assert!("xyz".parse::<NodeId>().is_err());
        assert!("abcd".parse::<NodeId>().is_err());
        let upper = "ABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD".parse::<NodeId>().unwrap();
        assert_eq!(upper.as_str(), "abcdefabcdefabcdefabcdefabcdefabcdefabcd");
    }

    #[test]
    fn test_load_or_generate_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node_key.json");
        assert!(!path.exists());

        let first = NodeKey::load_or_generate(&path).unwrap();
        assert!(path.exists());
        let second = NodeKey::load_or_generate(&path).unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(first.public_key(), second.public_key());
    }

    #[test]
    fn test_key_file_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node_key.json");
        NodeKey::generate().save(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["priv_key"]["type"], PRIV_KEY_TYPE);
        let value = json["priv_key"]["value"].as_str().unwrap();
        assert_eq!(general_purpose::STANDARD.decode(value).unwrap().len(), 64);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_corrupt_key_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node_key.json");
        fs::write(&path, "{\"priv_key\": {\"type\": \"tendermint/PrivKeyEd25519\", \"value\": \"AAAA\"}}")
            .unwrap();
        assert!(matches!(
            NodeKey::load_or_generate(&path),
            Err(NetworkError::NodeKey { .. })
        ));
    }
}
