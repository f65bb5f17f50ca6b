use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::rpc::Account;

/// Run configuration. The wallet and source account identify where
/// payments come from; the node endpoint is `host:port`.
#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
    pub wallet: String,
    pub source: Account,
    pub node_endpoint: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl SenderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }
}
