use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use cellmap::ring::BuildOptions;
use cellmap::{Mode, RegionCode};

/// Defaults read from a TOML file; command line arguments take precedence.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub global: GlobalConfig,
    pub geometry: BuildOptions,
    pub cover: CoverConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GlobalConfig {
    pub working_directory: Option<PathBuf>,
    pub tasks: Option<usize>,
    /// Pause after each region, in milliseconds
    pub cooldown_ms: Option<u64>,
    pub regions: Vec<RegionCode>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CoverConfig {
    pub level: Option<u8>,
    pub mode: Option<Mode>,
    pub compress: Option<bool>,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}
