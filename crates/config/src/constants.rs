//! Fixed file and directory names shared by the cache, generator and CLI
//!
//! These are not configurable; only their parent directories are.

pub const APP_DIR_NAME: &str = "kiln";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const CACHE_INDEX_FILE: &str = "index.json";
pub const ARTIFACTS_DIR: &str = "artifacts";

pub const TOOLCHAIN_FILE: &str = "kiln_toolchain.cmake";
pub const DEPS_MANIFEST_FILE: &str = "kiln_deps.json";

pub const RECIPE_EXTENSIONS: &[&str] = &["yml", "yaml"];

pub const DEFAULT_BUILD_TYPE: &str = "Release";
