//! Runtime configuration
//!
//! The data directory and the default feature list are explicit values handed
//! to the loaders at startup. Values come from defaults, an optional JSON file,
//! and the `MOUSESTYLES_DATA_DIR` environment variable, in that order.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DataError;
use crate::types::IntervalFeature;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "MOUSESTYLES_DATA_DIR";

/// Loader and annotation settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    /// Root of the `.npy` data layout
    pub data_dir: PathBuf,
    /// Interval features attached when a caller does not name any
    pub features: Vec<IntervalFeature>,
    /// Compute feature columns and subject-days on the rayon pool
    pub parallel: bool,
}

/// On-disk shape of [`Config`]; feature names stay text until validated
#[derive(Deserialize)]
struct RawConfig {
    data_dir: Option<PathBuf>,
    features: Option<Vec<String>>,
    parallel: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            features: IntervalFeature::ALL.to_vec(),
            parallel: true,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        let defaults = Self::default();
        Ok(Self {
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
            features: match raw.features {
                Some(names) => IntervalFeature::parse_list(&names)?,
                None => defaults.features,
            },
            parallel: raw.parallel.unwrap_or(defaults.parallel),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> Result<String, DataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Apply overrides from the process environment
    pub fn with_env(self) -> Self {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }
}
