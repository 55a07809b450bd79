//! Integration tests for toolchain generation

use kiln_generator::{generate, write, DepsManifest, InstalledPackage};
use kiln_hash::Hash;
use kiln_resolver::DependencyGraph;
use kiln_types::{OptionSet, OptionValue, RequirementKind, VersionSpec};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::tempdir;

const TERMINUS_IMAGE: &str = r"
name: terminus_image
version: '0.0.6'
description: Image processing utilities
url: https://github.com/Terminus-Geospatial/terminus_image
settings: [os, build_type]
options:
  shared: [true, false]
  with_tests: [true, false]
  with_docs: [true, false]
default_options:
  with_docs: false
";

fn graph() -> DependencyGraph {
    let root = Arc::new(kiln_recipe::load(TERMINUS_IMAGE).unwrap());
    let mut graph = DependencyGraph::new(root);
    let boost = graph.add_node(
        Arc::new(kiln_recipe::load("name: boost\nversion: '1.86.0'\n").unwrap()),
        0,
        RequirementKind::Regular,
        VersionSpec::any(),
        OptionSet::new(),
    );
    graph.add_node(
        Arc::new(kiln_recipe::load("name: bzip2\nversion: '1.0.8'\n").unwrap()),
        boost,
        RequirementKind::Regular,
        VersionSpec::any(),
        OptionSet::new(),
    );
    graph.add_node(
        Arc::new(kiln_recipe::load("name: terminus_cmake\nversion: '1.0.5'\n").unwrap()),
        0,
        RequirementKind::BuildTool,
        VersionSpec::any(),
        OptionSet::new(),
    );

    let root = graph.node_mut(0).unwrap();
    root.options = root.recipe.default_option_set();
    root.settings
        .insert("build_type".to_string(), "Debug".to_string());
    root.identity = Some(Hash::from_data(b"terminus_image"));
    graph
}

fn installed(names: &[&str]) -> BTreeMap<String, InstalledPackage> {
    names
        .iter()
        .map(|name| {
            (
                (*name).to_string(),
                InstalledPackage {
                    name: (*name).to_string(),
                    version: "1.0.0".parse().unwrap(),
                    identity: Hash::from_data(name.as_bytes()),
                    prefix: PathBuf::from("/cache/artifacts").join(name),
                    libs: vec![(*name).to_string()],
                },
            )
        })
        .collect()
}

#[test]
fn test_generate_variables() {
    let graph = graph();
    let payload = generate(
        graph.root(),
        &graph,
        &installed(&["boost", "bzip2", "terminus_cmake"]),
    )
    .unwrap();

    assert_eq!(payload.variable("KILN_PKG_NAME"), Some("terminus_image"));
    assert_eq!(payload.variable("KILN_PKG_VERSION"), Some("0.0.6"));
    assert_eq!(
        payload.variable("KILN_PKG_DESCRIPTION"),
        Some("Image processing utilities")
    );
    assert_eq!(payload.variable("CMAKE_BUILD_TYPE"), Some("Debug"));
    assert_eq!(payload.variable("BUILD_SHARED_LIBS"), Some("ON"));
    assert_eq!(payload.variable("TERMINUS_IMAGE_ENABLE_TESTS"), Some("ON"));
    assert_eq!(payload.variable("TERMINUS_IMAGE_ENABLE_DOCS"), Some("OFF"));
    assert_eq!(
        payload.variable("KILN_PKG_IDENTITY"),
        Some(Hash::from_data(b"terminus_image").to_hex().as_str())
    );
    assert_eq!(
        payload.variable("CMAKE_PREFIX_PATH"),
        Some("/cache/artifacts/boost;/cache/artifacts/bzip2;/cache/artifacts/terminus_cmake")
    );

    let kinds: Vec<_> = payload
        .dependencies
        .iter()
        .map(|dep| (dep.name.as_str(), dep.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("boost", RequirementKind::Regular),
            ("bzip2", RequirementKind::Regular),
            ("terminus_cmake", RequirementKind::BuildTool),
        ]
    );
}

#[test]
fn test_generate_requires_installed_dependencies() {
    let graph = graph();
    let err = generate(graph.root(), &graph, &installed(&["boost"])).unwrap_err();
    assert!(err.to_string().contains("bzip2/1.0.8"));
}

#[test]
fn test_leaf_has_no_prefix_path() {
    let mut graph = graph();
    let bzip2 = graph.find("bzip2").unwrap().id;
    graph
        .node_mut(bzip2)
        .unwrap()
        .options
        .insert("fPIC".to_string(), OptionValue::boolean(true));

    let payload = generate(graph.node(bzip2).unwrap(), &graph, &BTreeMap::new()).unwrap();
    assert!(payload.dependencies.is_empty());
    assert_eq!(payload.variable("CMAKE_PREFIX_PATH"), None);
    assert_eq!(payload.variable("CMAKE_BUILD_TYPE"), None);
    assert_eq!(payload.variable("BZIP2_FPIC"), Some("ON"));
}

#[tokio::test]
async fn test_write_emits_both_files() {
    let graph = graph();
    let payload = generate(
        graph.root(),
        &graph,
        &installed(&["boost", "bzip2", "terminus_cmake"]),
    )
    .unwrap();

    let dir = tempdir().unwrap();
    let files = write(&payload, &dir.path().join("generators")).await.unwrap();

    let toolchain = tokio::fs::read_to_string(&files.toolchain).await.unwrap();
    assert!(toolchain.contains("set(TERMINUS_IMAGE_ENABLE_TESTS \"ON\" CACHE BOOL"));
    assert!(files.toolchain.ends_with("kiln_toolchain.cmake"));

    let manifest: DepsManifest =
        serde_json::from_str(&tokio::fs::read_to_string(&files.manifest).await.unwrap()).unwrap();
    assert_eq!(manifest.package, "terminus_image/0.0.6");
    assert_eq!(manifest.dependencies.len(), 3);
    assert_eq!(
        manifest.dependencies[0].include_dirs,
        vec![PathBuf::from("/cache/artifacts/boost/include")]
    );
}
