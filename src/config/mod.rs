//! Runtime configuration (`spec.md` §4.14 ambient config). Loaded through the
//! teacher's [`ConfigLoader`], which accepts YAML/JSON/TOML/RON and expands
//! `$ENV_VAR` references via `shellexpand`.

mod config_loader;
pub use config_loader::ConfigLoader;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::fetch::AmbiguityPolicy;
use crate::load::DEFAULT_LOADER_CHUNK_SIZE;

fn default_db_path() -> PathBuf {
    PathBuf::from("biomdex.redb")
}

fn default_loader_chunk_size() -> usize {
    DEFAULT_LOADER_CHUNK_SIZE
}

fn default_index_chunk_size() -> usize {
    crate::index::DEFAULT_CHUNK_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicyConfig {
    #[default]
    Expand,
    Merge,
    MostReads { retain_public_id: bool },
}

impl AmbiguityPolicyConfig {
    pub fn to_policy(self) -> Option<AmbiguityPolicy> {
        match self {
            AmbiguityPolicyConfig::Expand => None,
            AmbiguityPolicyConfig::Merge => Some(AmbiguityPolicy::Merge),
            AmbiguityPolicyConfig::MostReads { retain_public_id } => {
                Some(AmbiguityPolicy::MostReads { retain_public_id })
            }
        }
    }
}

/// Top-level settings for an [`crate::engine::Engine`]. Loadable from a
/// config file via [`ConfigLoader::load`], or overridden by the
/// `BIOMDEX_DB_PATH` environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_loader_chunk_size")]
    pub loader_chunk_size: usize,
    #[serde(default = "default_index_chunk_size")]
    pub index_chunk_size: usize,
    #[serde(default)]
    pub default_ambiguity_policy: AmbiguityPolicyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            db_path: default_db_path(),
            loader_chunk_size: default_loader_chunk_size(),
            index_chunk_size: default_index_chunk_size(),
            default_ambiguity_policy: AmbiguityPolicyConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Applies the `BIOMDEX_DB_PATH` environment override on top of whatever
    /// was loaded from a config file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("BIOMDEX_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        self
    }
}
