use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};
use crate::types::DirMeta;
use crate::write::WriteOptions;

/// zstd level used when none is configured (fast, reasonable ratio)
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// store configuration stored in config.toml
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    /// metadata given to staged directories that have none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_dir_meta: Option<DirMeta>,
}

/// object encoding settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

fn default_compression_level() -> i32 {
    DEFAULT_COMPRESSION_LEVEL
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    /// writer options derived from this config
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            default_dir_meta: self.default_dir_meta.clone(),
        }
    }
}
