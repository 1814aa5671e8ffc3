//! monguard.toml configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use monguard_placement::NodeCandidate;
use monguard_state::ClusterSpec;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Directory holding the endpoint store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_fsid")]
    pub fsid: String,
    pub cluster: ClusterSpec,
    /// Node inventory for the local scheduler.
    #[serde(default)]
    pub nodes: Vec<NodeCandidate>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/monguard")
}

fn default_fsid() -> String {
    "local".to_string()
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: DaemonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("cluster.namespace must not be empty".into()));
        }
        if self.nodes.is_empty() {
            return Err(ConfigError::Invalid("at least one [[nodes]] entry is required".into()));
        }
        if let Some(stretch) = &self.cluster.mon.stretch {
            let arbiters = stretch.zones.iter().filter(|z| z.arbiter).count();
            if arbiters != 1 {
                return Err(ConfigError::Invalid(format!(
                    "stretch clusters need exactly one arbiter zone, found {arbiters}"
                )));
            }
            if stretch.data_zones().count() < 2 {
                return Err(ConfigError::Invalid(
                    "stretch clusters need at least two data zones".into(),
                ));
            }
        }
        Ok(())
    }
}
