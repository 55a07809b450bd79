#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Toolchain generation for kiln
//!
//! Translates a configured graph node into what an external CMake build
//! needs: a toolchain file of cache variables and a JSON manifest of the
//! installed dependencies. Nothing here runs the build tool.

mod payload;
mod toolchain;

pub use payload::{
    build_inputs, generate, DependencyEntry, DepsManifest, InstalledPackage, ToolchainPayload,
};
pub use toolchain::{option_variable, render_toolchain};

use kiln_config::constants::{DEPS_MANIFEST_FILE, TOOLCHAIN_FILE};
use kiln_errors::{BuildError, Error};
use std::path::{Path, PathBuf};

/// Paths of the files written by [`write`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedFiles {
    pub toolchain: PathBuf,
    pub manifest: PathBuf,
}

/// Write the toolchain file and dependency manifest into `dir`
///
/// # Errors
///
/// Returns an I/O error if `dir` cannot be created or written to.
pub async fn write(payload: &ToolchainPayload, dir: &Path) -> Result<GeneratedFiles, Error> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::io_with_path(&e, dir))?;

    let toolchain = dir.join(TOOLCHAIN_FILE);
    tokio::fs::write(&toolchain, render_toolchain(payload))
        .await
        .map_err(|e| Error::io_with_path(&e, &toolchain))?;

    let manifest = dir.join(DEPS_MANIFEST_FILE);
    let json = serde_json::to_string_pretty(&payload.manifest()).map_err(|e| {
        BuildError::GeneratorFailed {
            message: format!("failed to serialize dependency manifest: {e}"),
        }
    })?;
    tokio::fs::write(&manifest, json)
        .await
        .map_err(|e| Error::io_with_path(&e, &manifest))?;

    tracing::debug!(
        package = %payload.package,
        dir = %dir.display(),
        variables = payload.variables.len(),
        dependencies = payload.dependencies.len(),
        "toolchain written"
    );

    Ok(GeneratedFiles {
        toolchain,
        manifest,
    })
}
