//! CMake build tool

use crate::tool::{BuildContext, BuildTool, BuildToolFactory};
use async_trait::async_trait;
use kiln_errors::{BuildError, Error};
use kiln_generator::ToolchainPayload;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

/// Lines of tool stderr kept in failure messages
const STDERR_TAIL_LINES: usize = 20;

/// Creates [`CMakeBuildTool`]s sharing one program and generator
#[derive(Clone, Debug)]
pub struct CMakeFactory {
    program: String,
    generator: Option<String>,
}

impl CMakeFactory {
    #[must_use]
    pub fn new(program: impl Into<String>, generator: Option<String>) -> Self {
        Self {
            program: program.into(),
            generator,
        }
    }
}

impl Default for CMakeFactory {
    fn default() -> Self {
        Self::new("cmake", None)
    }
}

impl BuildToolFactory for CMakeFactory {
    fn create(&self, context: BuildContext) -> Arc<dyn BuildTool> {
        Arc::new(CMakeBuildTool {
            context,
            program: self.program.clone(),
            generator: self.generator.clone(),
        })
    }
}

/// Out-of-source CMake build of one node
#[derive(Debug)]
pub struct CMakeBuildTool {
    context: BuildContext,
    program: String,
    generator: Option<String>,
}

impl CMakeBuildTool {
    /// Binary tree inside the node's build directory
    fn tree(&self) -> PathBuf {
        self.context.build_dir.join("build")
    }

    fn configure_args(&self, source: &Path, toolchain: &Path) -> Vec<String> {
        let mut args = vec![
            "-S".to_string(),
            source.display().to_string(),
            "-B".to_string(),
            self.tree().display().to_string(),
            format!("-DCMAKE_TOOLCHAIN_FILE={}", toolchain.display()),
        ];
        if let Some(generator) = &self.generator {
            args.push("-G".to_string());
            args.push(generator.clone());
        }
        args
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "--build".to_string(),
            self.tree().display().to_string(),
        ];
        if self.context.jobs > 1 {
            args.push("--parallel".to_string());
            args.push(self.context.jobs.to_string());
        }
        // Multi-config generators pick the configuration at build time
        if let Some(build_type) = &self.context.build_type {
            args.push("--config".to_string());
            args.push(build_type.clone());
        }
        args
    }

    fn install_args(&self, destination: &Path) -> Vec<String> {
        let mut args = vec![
            "--install".to_string(),
            self.tree().display().to_string(),
            "--prefix".to_string(),
            destination.display().to_string(),
        ];
        if let Some(build_type) = &self.context.build_type {
            args.push("--config".to_string());
            args.push(build_type.clone());
        }
        args
    }

    async fn source_dir(&self) -> Result<&Path, Error> {
        let missing = |path: &str| BuildError::MissingSources {
            package: self.context.package.clone(),
            path: path.to_string(),
        };

        let source = self
            .context
            .source_dir
            .as_deref()
            .ok_or_else(|| missing("<none>"))?;
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(missing(&source.display().to_string()).into());
        }
        if !tokio::fs::try_exists(source.join("CMakeLists.txt"))
            .await
            .unwrap_or(false)
        {
            return Err(BuildError::ConfigureFailed {
                message: format!("no CMakeLists.txt in {}", source.display()),
            }
            .into());
        }
        Ok(source)
    }

    async fn run(
        &self,
        args: &[String],
        on_failure: fn(String) -> BuildError,
    ) -> Result<(), Error> {
        let program = which::which(&self.program).map_err(|_| BuildError::ToolNotFound {
            tool: self.program.clone(),
        })?;

        tracing::debug!(
            package = %self.context.package,
            command = %format!("{} {}", self.program, args.join(" ")),
            "running build tool"
        );

        let output = Command::new(&program)
            .args(args)
            .current_dir(&self.context.build_dir)
            .output()
            .await
            .map_err(|e| Error::io_with_path(&e, &program))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
        Err(on_failure(format!(
            "{} {} exited with {}\n{tail}",
            self.program,
            args.first().map_or("", String::as_str),
            output.status
        ))
        .into())
    }
}

#[async_trait]
impl BuildTool for CMakeBuildTool {
    async fn configure(&self, _payload: &ToolchainPayload, toolchain: &Path) -> Result<(), Error> {
        let source = self.source_dir().await?;
        let tree = self.tree();
        tokio::fs::create_dir_all(&tree)
            .await
            .map_err(|e| Error::io_with_path(&e, &tree))?;

        let args = self.configure_args(source, toolchain);
        self.run(&args, |message| BuildError::ConfigureFailed { message })
            .await
    }

    async fn build(&self) -> Result<(), Error> {
        self.run(&self.build_args(), |message| BuildError::CompileFailed {
            message,
        })
        .await
    }

    async fn install(&self, destination: &Path) -> Result<(), Error> {
        self.run(&self.install_args(destination), |message| {
            BuildError::InstallFailed { message }
        })
        .await
    }

    fn name(&self) -> &'static str {
        "cmake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn context(build_dir: &Path, source_dir: Option<PathBuf>) -> BuildContext {
        BuildContext {
            package: "zlib/1.3.1".to_string(),
            source_dir,
            build_dir: build_dir.to_path_buf(),
            generators_dir: build_dir.join("generators"),
            build_type: Some("Release".to_string()),
            jobs: 4,
        }
    }

    fn tool(context: BuildContext, program: &str) -> CMakeBuildTool {
        CMakeBuildTool {
            context,
            program: program.to_string(),
            generator: Some("Ninja".to_string()),
        }
    }

    fn payload() -> ToolchainPayload {
        ToolchainPayload {
            package: "zlib/1.3.1".to_string(),
            identity: None,
            variables: std::collections::BTreeMap::new(),
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn test_arguments() {
        let tool = tool(context(Path::new("/b/zlib"), None), "cmake");

        let configure = tool.configure_args(Path::new("/src/zlib"), Path::new("/b/zlib/generators/kiln_toolchain.cmake"));
        assert_eq!(
            configure,
            vec![
                "-S",
                "/src/zlib",
                "-B",
                "/b/zlib/build",
                "-DCMAKE_TOOLCHAIN_FILE=/b/zlib/generators/kiln_toolchain.cmake",
                "-G",
                "Ninja",
            ]
        );
        assert_eq!(
            tool.build_args(),
            vec!["--build", "/b/zlib/build", "--parallel", "4", "--config", "Release"]
        );
        assert_eq!(
            tool.install_args(Path::new("/stage")),
            vec!["--install", "/b/zlib/build", "--prefix", "/stage", "--config", "Release"]
        );
    }

    #[tokio::test]
    async fn test_configure_without_sources() {
        let temp = tempdir().unwrap();
        let tool = tool(context(temp.path(), None), "cmake");
        let err = tool
            .configure(&payload(), &temp.path().join("toolchain.cmake"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Build(BuildError::MissingSources { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("src");
        tokio::fs::create_dir_all(&source).await.unwrap();
        tokio::fs::write(source.join("CMakeLists.txt"), "project(zlib C)\n")
            .await
            .unwrap();

        let tool = tool(
            context(&temp.path().join("build"), Some(source)),
            "kiln-test-no-such-cmake",
        );
        let err = tool
            .configure(&payload(), &temp.path().join("toolchain.cmake"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Build(BuildError::ToolNotFound { ref tool }) if tool == "kiln-test-no-such-cmake"
        ));
    }
}
