use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::models::BranchType;

#[derive(Debug, Deserialize, Clone)]
pub struct ArborConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub autolink: AutoLinkConfig,
    #[serde(default)]
    pub visualization: VisualizationConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Defaults applied to auto-link requests that leave a field unset.
#[derive(Debug, Deserialize, Clone)]
pub struct AutoLinkConfig {
    pub min_weight: f64,
    pub max_connections: usize,
    pub bidirectional: bool,
    pub types: Vec<BranchType>,
    /// Most recent fragments compared pairwise when no focus is given
    pub pool_limit: usize,
}

impl Default for AutoLinkConfig {
    fn default() -> Self {
        Self {
            min_weight: 0.3,
            max_connections: 10,
            bidirectional: false,
            types: vec![BranchType::Theme, BranchType::Emotion, BranchType::Time],
            pool_limit: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VisualizationConfig {
    pub max_depth: u32,
    pub min_weight: f64,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            min_weight: 0.1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8767,
        }
    }
}

impl ArborConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }

    /// Parse a config from an inline TOML string.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(source, config::FileFormat::Toml))
            .build()?;
        s.try_deserialize()
    }
}
