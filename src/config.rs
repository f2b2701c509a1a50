// Node configuration with TOML file support

use crate::consensus::ValidationMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Settings for a ledger node.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the snapshot and the keystore
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Leading zero hex digits a proof must produce; 0 accepts any proof
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,

    /// `strict` or `permissive` chain validation
    #[serde(default)]
    pub validation: ValidationMode,

    /// Peer URLs registered at startup
    #[serde(default)]
    pub peers: Vec<String>,

    #[serde(default = "default_peer_timeout_secs")]
    pub peer_timeout_secs: u64,

    /// Default log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_difficulty() -> u32 {
    4
}

fn default_peer_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl NodeConfig {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout_secs)
    }

    pub fn keystore_path(&self) -> PathBuf {
        self.data_dir.join("keystore.json")
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            difficulty: default_difficulty(),
            validation: ValidationMode::default(),
            peers: Vec::new(),
            peer_timeout_secs: default_peer_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}
