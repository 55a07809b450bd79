//! Configuration sections

use crate::constants::DEFAULT_BUILD_TYPE;
use kiln_types::{ColorChoice, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    #[serde(default = "default_color_choice")]
    pub color: ColorChoice,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: OutputFormat::Tty,
            color: ColorChoice::Auto,
        }
    }
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Concurrent step limit; 0 = one per core
    #[serde(default)]
    pub jobs: usize,
    /// Parent directory for per-node scratch build directories
    #[serde(default)]
    pub build_root: Option<PathBuf>,
    /// Default `build_type` setting
    #[serde(default = "default_build_type")]
    pub build_type: String,
    /// Build tool executable used by the CMake adapter
    #[serde(default = "default_cmake_program")]
    pub cmake: String,
    /// Optional CMake generator (`Ninja`, `Unix Makefiles`)
    #[serde(default)]
    pub generator: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            build_root: None,
            build_type: default_build_type(),
            cmake: default_cmake_program(),
            generator: None,
        }
    }
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    pub cache_dir: Option<PathBuf>,
    pub registry_dir: Option<PathBuf>,
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Tty
}

fn default_color_choice() -> ColorChoice {
    ColorChoice::Auto
}

fn default_build_type() -> String {
    DEFAULT_BUILD_TYPE.to_string()
}

fn default_cmake_program() -> String {
    "cmake".to_string()
}
