//! Application configuration.
//!
//! Aggregates configuration into a single Config struct that can be loaded
//! from YAML files or environment variables.

mod storage;

pub use storage::{DynamoConfig, StorageConfig, StorageType};

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "DENSITY_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "DENSITY";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "DENSITY_LOG";

/// Default TTL horizon for raw records.
pub const DEFAULT_RAW_RETENTION_DAYS: u32 = 90;
/// Default page size for raw listings.
pub const DEFAULT_RAW_PAGE_SIZE: usize = 100;
/// Default ceiling on periods in one listing page.
pub const DEFAULT_MAX_PERIODS_PER_PAGE: usize = 10_000;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Timeline behaviour.
    pub timeline: TimelineConfig,
}

/// Knobs for the raw and aggregate timeline stores.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Limit applied to aggregate range reads. `None` lets the store decide.
    pub query_page_size: Option<usize>,
    /// Most periods returned in one listing page.
    pub max_periods_per_page: usize,
    /// Limit applied to raw listings.
    pub raw_page_size: usize,
    /// Days a raw record lives past its fragment timestamp.
    pub raw_retention_days: u32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            query_page_size: None,
            max_periods_per_page: DEFAULT_MAX_PERIODS_PER_PAGE,
            raw_page_size: DEFAULT_RAW_PAGE_SIZE,
            raw_retention_days: DEFAULT_RAW_RETENTION_DAYS,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}
