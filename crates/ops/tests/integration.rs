//! Integration tests for ops crate

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use kiln_builder::{BuildContext, BuildTool, BuildToolFactory};
    use kiln_config::Config;
    use kiln_errors::{BuildError, Error, OptionError};
    use kiln_generator::ToolchainPayload;
    use kiln_ops::{OperationResult, OpsContextBuilder, OpsCtx, SessionRequest};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Build tool that succeeds for everything except one package
    struct StubFactory {
        fail: Option<String>,
    }

    struct StubTool {
        package: String,
        fail: bool,
    }

    impl BuildToolFactory for StubFactory {
        fn create(&self, context: BuildContext) -> Arc<dyn BuildTool> {
            Arc::new(StubTool {
                fail: self.fail.as_deref() == Some(context.package.as_str()),
                package: context.package,
            })
        }
    }

    #[async_trait]
    impl BuildTool for StubTool {
        async fn configure(
            &self,
            _payload: &ToolchainPayload,
            _toolchain: &Path,
        ) -> Result<(), Error> {
            Ok(())
        }

        async fn build(&self) -> Result<(), Error> {
            if self.fail {
                return Err(BuildError::CompileFailed {
                    message: format!("{} does not compile", self.package),
                }
                .into());
            }
            Ok(())
        }

        async fn install(&self, destination: &Path) -> Result<(), Error> {
            tokio::fs::create_dir_all(destination.join("lib"))
                .await
                .map_err(Error::from)
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    struct Workspace {
        dir: TempDir,
        recipe: PathBuf,
        registry: PathBuf,
    }

    /// A -> B(^1.0) -> D(>=2.0), A -(test)-> C, written to disk
    async fn workspace() -> Workspace {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("registry");
        tokio::fs::create_dir_all(&registry).await.unwrap();

        for (file, yaml) in [
            ("b-1.2.0.yml", "name: b\nversion: '1.2.0'\nrequires: ['d/>=2.0']\n"),
            ("b-2.0.0.yml", "name: b\nversion: '2.0.0'\n"),
            ("c.yml", "name: c\nversion: '1.0.0'\n"),
            ("d-1.9.0.yml", "name: d\nversion: '1.9.0'\n"),
            ("d-2.1.0.yml", "name: d\nversion: '2.1.0'\noptions: { shared: [true, false] }\ndefault_options: { shared: false }\n"),
        ] {
            tokio::fs::write(registry.join(file), yaml).await.unwrap();
        }

        let recipe = dir.path().join("a.yml");
        tokio::fs::write(
            &recipe,
            "name: a\nversion: '1.0.0'\nsettings: [build_type]\nrequires: ['b/^1.0']\ntest_requires: [c/1.0.0]\n",
        )
        .await
        .unwrap();

        Workspace {
            dir,
            recipe,
            registry,
        }
    }

    impl Workspace {
        fn ctx(&self, fail: Option<&str>) -> OpsCtx {
            let mut config = Config::default();
            config.paths.cache_dir = Some(self.dir.path().join("cache"));
            config.build.build_root = Some(self.dir.path().join("build"));
            config.build.jobs = 2;

            let (tx, _rx) = kiln_events::channel();
            OpsContextBuilder::new()
                .with_config(config)
                .with_event_sender(tx)
                .with_build_tool_factory(Arc::new(StubFactory {
                    fail: fail.map(str::to_string),
                }))
                .build()
                .unwrap()
        }

        fn request(&self) -> SessionRequest {
            SessionRequest {
                registry: Some(self.registry.clone()),
                ..SessionRequest::new(&self.recipe)
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_end_to_end_build() {
        let ws = workspace().await;
        let ctx = ws.ctx(None);

        let report = kiln_ops::build(&ctx, &ws.request()).await.unwrap();
        assert_eq!(report.package, "a/1.0.0");
        assert_eq!(report.installed, vec!["d/2.1.0", "b/1.2.0", "a/1.0.0"]);
        assert!(report.cached.is_empty());
        assert_eq!(report.steps_executed, 15);

        let again = kiln_ops::build(&ctx, &ws.request()).await.unwrap();
        assert!(again.installed.is_empty());
        assert_eq!(again.cached.len(), 3);
        assert_eq!(again.steps_executed, 0);

        let json = OperationResult::Build(again).to_json().unwrap();
        assert!(json.contains("\"type\": \"build\""));
    }

    #[tokio::test]
    async fn test_failed_build_names_node_and_step() {
        let ws = workspace().await;
        let ctx = ws.ctx(Some("d/2.1.0"));

        match kiln_ops::build(&ctx, &ws.request()).await.unwrap_err() {
            Error::Build(BuildError::StepFailure { node, step, cause }) => {
                assert_eq!(node, "d/2.1.0");
                assert_eq!(step, "build");
                assert!(cause.contains("does not compile"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_graph_with_tests_and_overrides() {
        let ws = workspace().await;
        let ctx = ws.ctx(None);

        let mut request = ws.request();
        request.include_tests = true;
        request.overrides = vec!["d:shared=True".parse().unwrap()];

        let report = kiln_ops::graph(&ctx, &request).await.unwrap();
        assert_eq!(report.root, "a/1.0.0");
        assert_eq!(report.restarts, 0);
        assert_eq!(report.nodes.len(), 4);

        let d = report.nodes.iter().find(|n| n.package == "d/2.1.0").unwrap();
        assert_eq!(d.options["shared"], "True");
        let c = report.nodes.iter().find(|n| n.package == "c/1.0.0").unwrap();
        assert_eq!(c.context, "test");
        assert!(report
            .edges
            .iter()
            .any(|e| e.from == "a/1.0.0" && e.to == "b/1.2.0"));
        assert_eq!(report.batches.last().unwrap(), &vec!["a/1.0.0".to_string()]);
    }

    #[tokio::test]
    async fn test_identity_follows_settings() {
        let ws = workspace().await;
        let ctx = ws.ctx(None);

        let release = kiln_ops::identity(&ctx, &ws.request()).await.unwrap();
        let mut request = ws.request();
        request.settings = vec!["build_type=Debug".to_string()];
        let debug = kiln_ops::identity(&ctx, &request).await.unwrap();

        assert_eq!(release.root.package, "a/1.0.0");
        assert_eq!(release.root.identity.len(), 64);
        assert_ne!(release.root.identity, debug.root.identity);

        // d does not declare build_type
        let d_release = release.nodes.iter().find(|n| n.package == "d/2.1.0");
        let d_debug = debug.nodes.iter().find(|n| n.package == "d/2.1.0");
        assert_eq!(d_release, d_debug);
    }

    #[tokio::test]
    async fn test_unknown_option_fails_before_building() {
        let ws = workspace().await;
        let ctx = ws.ctx(None);

        let mut request = ws.request();
        request.overrides = vec!["a:missing=1".parse().unwrap()];

        let err = kiln_ops::build(&ctx, &request).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Options(OptionError::UnknownOption { .. })
        ));
        assert!(!ws.dir.path().join("cache").exists());
    }

    #[tokio::test]
    async fn test_missing_recipe() {
        let ws = workspace().await;
        let ctx = ws.ctx(None);
        let request = SessionRequest::new(ws.dir.path().join("nope.yml"));

        assert!(kiln_ops::build(&ctx, &request).await.is_err());
    }
}
