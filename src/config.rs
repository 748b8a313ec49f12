//! Configuration management

use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::Deserialize;
use std::path::Path;

/// Config file read when `--config` is not given. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "weblog.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub geoip: GeoIpConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeoIpConfig {
    pub enabled: bool,
    pub database: String,
    /// Parallel lookup workers
    pub workers: usize,
    /// Language of the country names stored in the database
    pub locale: String,
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database: "./GeoLite2-Country.mmdb".to_string(),
            workers: 32,
            locale: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle gap after which the next hit from an address opens a new visit
    pub timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { timeout_secs: 600 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Rows in each top-N table
    pub top: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { top: 10 }
    }
}

impl Config {
    /// Load from `path` (required) or from `weblog.toml` (optional), then
    /// `WEBLOG_*` environment variables, e.g. `WEBLOG_GEOIP__WORKERS=8`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => {
                let name = p
                    .to_str()
                    .with_context(|| format!("Config path is not valid UTF-8: {}", p.display()))?;
                config::File::new(name, config::FileFormat::Toml).required(true)
            }
            None => config::File::new(DEFAULT_CONFIG_FILE, config::FileFormat::Toml).required(false),
        };

        let builder = config::Config::builder().add_source(file).add_source(
            config::Environment::with_prefix("WEBLOG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build().context("Failed to read configuration")?;
        let config: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate geoip config
        if self.geoip.workers == 0 {
            anyhow::bail!("Invalid geoip.workers: at least one worker is required");
        }
        if self.geoip.locale.is_empty() {
            anyhow::bail!("GeoIP locale cannot be empty");
        }
        if self.geoip.enabled && self.geoip.database.is_empty() {
            anyhow::bail!("GeoIP database path cannot be empty while geoip is enabled");
        }

        // Validate session config
        if self.session.timeout_secs == 0 {
            anyhow::bail!("Invalid session.timeout_secs: 0 is not allowed");
        }
        if self.session_timeout().is_none() {
            anyhow::bail!(
                "Invalid session.timeout_secs: {} is out of range",
                self.session.timeout_secs
            );
        }

        // Validate logging level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid logging level '{}'. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        Ok(())
    }

    pub fn session_timeout(&self) -> Option<TimeDelta> {
        i64::try_from(self.session.timeout_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
    }
}
