#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::schema::CreationPolicy;

pub const APP_DIR_NAME: &str = "pdet-geodb";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Overrides `mongo.uri`, keeping credentials out of the config file
pub const URI_ENV: &str = "PDET_MONGO_URI";
/// Overrides `mongo.database`
pub const DATABASE_ENV: &str = "PDET_MONGO_DATABASE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub mongo: MongoConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub app_name: String,
    pub connect_timeout_secs: u64,
    pub server_selection_timeout_secs: u64,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "pdet_solar_analysis".to_string(),
            app_name: APP_DIR_NAME.to_string(),
            connect_timeout_secs: 10,
            server_selection_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchemaConfig {
    pub policy: CreationPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    /// Case-insensitive substring matched against `pdet_region`
    pub region_pattern: String,
    pub sample_limit: u32,
    pub top_limit: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            region_pattern: "Pacífico".to_string(),
            sample_limit: 5,
            top_limit: 10,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid MongoDB URI: {0} (must start with mongodb:// or mongodb+srv://)")]
    InvalidUri(String),
    #[error("Invalid database name: {0:?}")]
    InvalidDatabase(String),
    #[error("Invalid application name: {0:?} (cannot be empty)")]
    InvalidAppName(String),
    #[error("Invalid connect timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidConnectTimeout(u64),
    #[error("Invalid server selection timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidServerSelectionTimeout(u64),
    #[error("Invalid region pattern: cannot be empty")]
    InvalidRegionPattern,
    #[error("Invalid limit: {0} (must be between 1 and 1000)")]
    InvalidLimit(u32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load `config.toml` from `config_dir`, apply environment overrides and validate.
    ///
    /// A missing file yields the defaults.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        Self::load_with_env(config_dir, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with an injectable environment lookup.
    #[inline]
    pub fn load_with_env<P, F>(config_dir: P, env: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            toml::from_str::<Config>(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Config::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();
        config.apply_env_overrides(env);

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Default per-user configuration directory
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn apply_env_overrides<F: Fn(&str) -> Option<String>>(&mut self, env: F) {
        if let Some(uri) = env(URI_ENV).filter(|v| !v.trim().is_empty()) {
            debug!("Using MongoDB URI from {}", URI_ENV);
            self.mongo.uri = uri;
        }
        if let Some(database) = env(DATABASE_ENV).filter(|v| !v.trim().is_empty()) {
            debug!("Using database name from {}", DATABASE_ENV);
            self.mongo.database = database;
        }
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mongo.validate()?;
        self.report.validate()?;
        Ok(())
    }
}

impl MongoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let hosts = self
            .uri
            .strip_prefix("mongodb://")
            .or_else(|| self.uri.strip_prefix("mongodb+srv://"))
            .ok_or_else(|| ConfigError::InvalidUri(self.redacted_uri()))?;
        let authority = hosts.split('/').next().unwrap_or_default();
        let host_list = authority.rsplit('@').next().unwrap_or_default();
        if host_list.trim().is_empty() {
            return Err(ConfigError::InvalidUri(self.redacted_uri()));
        }

        validate_database_name(&self.database)?;

        if self.app_name.trim().is_empty() {
            return Err(ConfigError::InvalidAppName(self.app_name.clone()));
        }

        if !(1..=300).contains(&self.connect_timeout_secs) {
            return Err(ConfigError::InvalidConnectTimeout(
                self.connect_timeout_secs,
            ));
        }

        if !(1..=300).contains(&self.server_selection_timeout_secs) {
            return Err(ConfigError::InvalidServerSelectionTimeout(
                self.server_selection_timeout_secs,
            ));
        }

        Ok(())
    }

    /// The URI with any password replaced by `****`
    pub fn redacted_uri(&self) -> String {
        let Some((scheme, rest)) = self.uri.split_once("://") else {
            return self.uri.clone();
        };
        let authority_end = rest.find('/').unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);
        match authority.rsplit_once('@') {
            Some((userinfo, hosts)) => {
                let user = userinfo.split(':').next().unwrap_or_default();
                if userinfo.contains(':') {
                    format!("{scheme}://{user}:****@{hosts}{tail}")
                } else {
                    format!("{scheme}://{user}@{hosts}{tail}")
                }
            }
            None => self.uri.clone(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_secs(self.server_selection_timeout_secs)
    }

    pub fn set_uri(&mut self, uri: String) -> Result<(), ConfigError> {
        let candidate = MongoConfig {
            uri: uri.clone(),
            ..self.clone()
        };
        candidate.validate()?;
        self.uri = uri;
        Ok(())
    }

    pub fn set_database(&mut self, database: String) -> Result<(), ConfigError> {
        validate_database_name(&database)?;
        self.database = database;
        Ok(())
    }
}

impl ReportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region_pattern.trim().is_empty() {
            return Err(ConfigError::InvalidRegionPattern);
        }
        for limit in [self.sample_limit, self.top_limit] {
            if !(1..=1000).contains(&limit) {
                return Err(ConfigError::InvalidLimit(limit));
            }
        }
        Ok(())
    }
}

fn validate_database_name(name: &str) -> Result<(), ConfigError> {
    const FORBIDDEN: &[char] = &['/', '\\', '.', ' ', '"', '$'];
    if name.is_empty() || name.contains(FORBIDDEN) {
        return Err(ConfigError::InvalidDatabase(name.to_string()));
    }
    Ok(())
}
