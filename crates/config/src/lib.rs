#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for kiln
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/kiln/config.toml)
//! - Environment variables
//! - CLI flags (applied by the binary on top of the result)

pub mod constants;
pub mod sections;

pub use sections::{BuildConfig, GeneralConfig, PathConfig};

use kiln_errors::{ConfigError, Error};
use kiln_types::{ColorChoice, Settings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub paths: PathConfig,

    /// Extra session settings (`compiler = "gcc"`); host values fill the rest
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir
            .join(constants::APP_DIR_NAME)
            .join(constants::CONFIG_FILE_NAME))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        Self::parse(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a field has the wrong type.
    pub fn parse(contents: &str) -> Result<Self, Error> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "loading configuration");
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        self.merge_env_from(|key| std::env::var(key).ok())
    }

    /// Merge values from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns an error for values that do not parse.
    pub fn merge_env_from<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(jobs) = lookup("KILN_JOBS") {
            self.build.jobs = jobs.parse().map_err(|_| ConfigError::InvalidValue {
                field: "KILN_JOBS".to_string(),
                value: jobs,
            })?;
        }

        if let Some(dir) = lookup("KILN_CACHE_DIR") {
            self.paths.cache_dir = Some(PathBuf::from(dir));
        }

        if let Some(dir) = lookup("KILN_BUILD_ROOT") {
            self.build.build_root = Some(PathBuf::from(dir));
        }

        if let Some(dir) = lookup("KILN_REGISTRY") {
            self.paths.registry_dir = Some(PathBuf::from(dir));
        }

        if let Some(build_type) = lookup("KILN_BUILD_TYPE") {
            if build_type.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "KILN_BUILD_TYPE".to_string(),
                    value: build_type,
                }
                .into());
            }
            self.build.build_type = build_type;
        }

        if let Some(color) = lookup("KILN_COLOR") {
            self.general.color = match color.as_str() {
                "always" => ColorChoice::Always,
                "auto" => ColorChoice::Auto,
                "never" => ColorChoice::Never,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "KILN_COLOR".to_string(),
                        value: color,
                    }
                    .into())
                }
            };
        }

        Ok(())
    }

    /// Artifact cache directory (with default)
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.paths.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(constants::APP_DIR_NAME)
        })
    }

    /// Root for scratch build directories (with default)
    #[must_use]
    pub fn build_root(&self) -> PathBuf {
        self.build
            .build_root
            .clone()
            .unwrap_or_else(|| self.cache_dir().join("build"))
    }

    /// Recipe registry directory, if one is configured
    #[must_use]
    pub fn registry_dir(&self) -> Option<&Path> {
        self.paths.registry_dir.as_deref()
    }

    /// Effective job count
    #[must_use]
    pub fn jobs(&self) -> usize {
        calculate_build_jobs(self.build.jobs)
    }

    /// Session settings: host `os`/`arch`, configured `build_type`, then the
    /// `[settings]` table on top
    #[must_use]
    pub fn session_settings(&self) -> Settings {
        let mut settings = host_settings();
        settings.insert("build_type".to_string(), self.build.build_type.clone());
        settings.extend(self.settings.clone());
        settings
    }
}

/// Calculate build jobs based on CPU count
#[must_use]
pub fn calculate_build_jobs(config_value: usize) -> usize {
    if config_value > 0 {
        config_value
    } else {
        num_cpus::get().max(1)
    }
}

/// Settings describing the machine kiln runs on
#[must_use]
pub fn host_settings() -> Settings {
    let os = match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Macos",
        "windows" => "Windows",
        "freebsd" => "FreeBSD",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "aarch64" => "armv8",
        "x86" => "x86",
        other => other,
    };

    let mut settings = Settings::new();
    settings.insert("os".to_string(), os.to_string());
    settings.insert("arch".to_string(), arch.to_string());
    settings
}
