//! Configuration management for the risk engine
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::RiskError;
use crate::analysis::grid::grid_side;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// External geodata service endpoints and timeouts
    #[serde(default)]
    pub services: ServicesConfig,
    /// Grid partitioning settings
    #[serde(default)]
    pub grid: GridConfig,
    /// Result cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Municipalities added to the built-in directory
    #[serde(default)]
    pub municipalities: Vec<MunicipalityEntry>,
}

/// Geodata service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_nominatim_url")]
    pub nominatim_url: String,
    #[serde(default = "default_ibge_malha_url")]
    pub ibge_malha_url: String,
    #[serde(default = "default_open_elevation_url")]
    pub open_elevation_url: String,
    #[serde(default = "default_overpass_url")]
    pub overpass_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_nominatim_timeout")]
    pub nominatim_timeout_seconds: u32,
    #[serde(default = "default_ibge_timeout")]
    pub ibge_timeout_seconds: u32,
    #[serde(default = "default_elevation_timeout")]
    pub elevation_timeout_seconds: u32,
    #[serde(default = "default_overpass_timeout")]
    pub overpass_timeout_seconds: u32,
    /// Maximum number of retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Grid partitioning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of zones per municipality, must be a perfect square
    #[serde(default = "default_zone_count")]
    pub zone_count: usize,
    /// Side of the elevation sampling grid per zone
    #[serde(default = "default_elevation_grid_size")]
    pub elevation_grid_size: usize,
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default freshness window for cached results
    #[serde(default = "default_freshness_minutes")]
    pub freshness_minutes: u32,
    /// Entries older than this are evicted
    #[serde(default = "default_retention_minutes")]
    pub retention_minutes: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Municipality known by its regional code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MunicipalityEntry {
    pub code: String,
    pub name: String,
    pub uf: String,
}

// Default value functions
fn default_nominatim_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_ibge_malha_url() -> String {
    "https://servicodados.ibge.gov.br/api/v3/malhas/municipios".to_string()
}

fn default_open_elevation_url() -> String {
    "https://api.open-elevation.com/api/v1/lookup".to_string()
}

fn default_overpass_url() -> String {
    "https://overpass-api.de/api/interpreter".to_string()
}

fn default_user_agent() -> String {
    format!("climarisk/{} (Risk Assessment Platform)", crate::VERSION)
}

fn default_nominatim_timeout() -> u32 {
    10
}

fn default_ibge_timeout() -> u32 {
    15
}

fn default_elevation_timeout() -> u32 {
    20
}

fn default_overpass_timeout() -> u32 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_zone_count() -> usize {
    100
}

fn default_elevation_grid_size() -> usize {
    5
}

fn default_freshness_minutes() -> u32 {
    10
}

fn default_retention_minutes() -> u32 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            nominatim_url: default_nominatim_url(),
            ibge_malha_url: default_ibge_malha_url(),
            open_elevation_url: default_open_elevation_url(),
            overpass_url: default_overpass_url(),
            user_agent: default_user_agent(),
            nominatim_timeout_seconds: default_nominatim_timeout(),
            ibge_timeout_seconds: default_ibge_timeout(),
            elevation_timeout_seconds: default_elevation_timeout(),
            overpass_timeout_seconds: default_overpass_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl ServicesConfig {
    #[must_use]
    pub fn nominatim_timeout(&self) -> Duration {
        Duration::from_secs(self.nominatim_timeout_seconds.into())
    }

    #[must_use]
    pub fn ibge_timeout(&self) -> Duration {
        Duration::from_secs(self.ibge_timeout_seconds.into())
    }

    #[must_use]
    pub fn elevation_timeout(&self) -> Duration {
        Duration::from_secs(self.elevation_timeout_seconds.into())
    }

    #[must_use]
    pub fn overpass_timeout(&self) -> Duration {
        Duration::from_secs(self.overpass_timeout_seconds.into())
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            zone_count: default_zone_count(),
            elevation_grid_size: default_elevation_grid_size(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_minutes: default_freshness_minutes(),
            retention_minutes: default_retention_minutes(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(u64::from(self.freshness_minutes) * 60)
    }

    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_minutes) * 60)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            services: ServicesConfig::default(),
            grid: GridConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
            municipalities: Vec::new(),
        }
    }
}

impl RiskConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path()
                .filter(|path| path.exists())
                .unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. CLIMARISK__GRID__ZONE_COUNT=25
        builder = builder.add_source(
            Environment::with_prefix("CLIMARISK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: RiskConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("climarisk").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.services.user_agent.is_empty() {
            self.services.user_agent = default_user_agent();
        }
        if self.services.nominatim_timeout_seconds == 0 {
            self.services.nominatim_timeout_seconds = default_nominatim_timeout();
        }
        if self.services.ibge_timeout_seconds == 0 {
            self.services.ibge_timeout_seconds = default_ibge_timeout();
        }
        if self.services.elevation_timeout_seconds == 0 {
            self.services.elevation_timeout_seconds = default_elevation_timeout();
        }
        if self.services.overpass_timeout_seconds == 0 {
            self.services.overpass_timeout_seconds = default_overpass_timeout();
        }
        if self.cache.freshness_minutes == 0 {
            self.cache.freshness_minutes = default_freshness_minutes();
        }
        if self.cache.retention_minutes == 0 {
            self.cache.retention_minutes = default_retention_minutes();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.validate_municipalities()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        let timeouts = [
            self.services.nominatim_timeout_seconds,
            self.services.ibge_timeout_seconds,
            self.services.elevation_timeout_seconds,
            self.services.overpass_timeout_seconds,
        ];
        if timeouts.iter().any(|t| *t > 120) {
            return Err(RiskError::config("Service timeouts cannot exceed 120 seconds").into());
        }

        if self.services.max_retries > 10 {
            return Err(RiskError::config("Service max retries cannot exceed 10").into());
        }

        if grid_side(self.grid.zone_count).is_none() || self.grid.zone_count > 400 {
            return Err(RiskError::config(format!(
                "Zone count must be a perfect square between 1 and 400, got {}",
                self.grid.zone_count
            ))
            .into());
        }

        if !(2..=20).contains(&self.grid.elevation_grid_size) {
            return Err(RiskError::config("Elevation grid size must be between 2 and 20").into());
        }

        if self.cache.freshness_minutes > self.cache.retention_minutes {
            return Err(RiskError::config(
                "Cache freshness cannot exceed cache retention",
            )
            .into());
        }

        if self.cache.retention_minutes > 24 * 60 {
            return Err(RiskError::config("Cache retention cannot exceed 24 hours").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(RiskError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(RiskError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let urls = [
            ("nominatim_url", &self.services.nominatim_url),
            ("ibge_malha_url", &self.services.ibge_malha_url),
            ("open_elevation_url", &self.services.open_elevation_url),
            ("overpass_url", &self.services.overpass_url),
        ];
        for (name, url) in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(RiskError::config(format!(
                    "Service URL '{name}' must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }

    fn validate_municipalities(&self) -> Result<()> {
        for entry in &self.municipalities {
            if entry.code.trim().is_empty() || entry.name.trim().is_empty() {
                return Err(RiskError::config(format!(
                    "Municipality entries need a code and a name: {entry:?}"
                ))
                .into());
            }
            if entry.uf.len() != 2 {
                return Err(RiskError::config(format!(
                    "Municipality {} has an invalid UF '{}'",
                    entry.code, entry.uf
                ))
                .into());
            }
        }
        Ok(())
    }
}
