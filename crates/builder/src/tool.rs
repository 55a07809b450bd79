//! Build tool adapter traits

use async_trait::async_trait;
use kiln_errors::Error;
use kiln_generator::ToolchainPayload;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where one node is built
#[derive(Clone, Debug)]
pub struct BuildContext {
    /// `name/version`
    pub package: String,
    /// Recipe sources; `None` when the recipe names none
    pub source_dir: Option<PathBuf>,
    /// Scoped build directory of the node
    pub build_dir: PathBuf,
    /// Directory holding the generated toolchain files
    pub generators_dir: PathBuf,
    pub build_type: Option<String>,
    /// Parallelism handed to the build tool
    pub jobs: usize,
}

/// Drives an external build system for one node
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Configure the build tree from the generated toolchain
    async fn configure(&self, payload: &ToolchainPayload, toolchain: &Path) -> Result<(), Error>;

    /// Compile the configured tree
    async fn build(&self) -> Result<(), Error>;

    /// Install build outputs into `destination`
    async fn install(&self, destination: &Path) -> Result<(), Error>;

    /// Build tool name for logs
    fn name(&self) -> &'static str;
}

/// Creates a [`BuildTool`] per node
pub trait BuildToolFactory: Send + Sync {
    fn create(&self, context: BuildContext) -> Arc<dyn BuildTool>;
}
