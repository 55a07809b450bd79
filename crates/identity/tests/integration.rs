//! Integration tests for package identities over resolved graphs

use kiln_identity::annotate;
use kiln_index::RecipeIndex;
use kiln_resolver::{DependencyGraph, Resolver};
use kiln_types::Settings;
use std::sync::Arc;

fn index() -> RecipeIndex {
    RecipeIndex::new()
        .with(
            kiln_recipe::load(
                "name: zlib\nversion: '1.3.1'\nsettings: [os, arch, build_type]\noptions: { shared: [true, false] }\n",
            )
            .unwrap(),
        )
        .with(
            kiln_recipe::load(
                "name: terminus_cmake\nversion: '1.0.5'\npackage_id: clear\nsettings: [build_type]\n",
            )
            .unwrap(),
        )
}

fn session(build_type: &str) -> Settings {
    Settings::from([
        ("os".to_string(), "Linux".to_string()),
        ("arch".to_string(), "x86_64".to_string()),
        ("build_type".to_string(), build_type.to_string()),
    ])
}

fn resolve(overrides: &[&str], build_type: &str) -> DependencyGraph {
    let root = Arc::new(
        kiln_recipe::load(
            "name: app\nversion: '2.0'\nsettings: [os, build_type]\nrequires: [zlib/1.3.1]\ntool_requires: [terminus_cmake/1.0.5]\n",
        )
        .unwrap(),
    );
    let index = index();
    let mut graph = Resolver::new(&index).resolve(root).unwrap().graph;

    let overrides: Vec<kiln_options::OptionOverride> =
        overrides.iter().map(|o| o.parse().unwrap()).collect();
    kiln_options::propagate(&mut graph, &overrides).unwrap();
    annotate(&mut graph, &session(build_type)).unwrap();
    graph
}

fn identity_of(graph: &DependencyGraph, name: &str) -> String {
    graph.find(name).unwrap().identity.unwrap().to_hex()
}

#[test]
fn test_identities_are_deterministic() {
    let a = resolve(&[], "Release");
    let b = resolve(&[], "Release");
    for node in a.nodes() {
        assert_eq!(identity_of(&a, node.name()), identity_of(&b, node.name()));
    }
}

#[test]
fn test_clear_identity_ignores_build_type() {
    let release = resolve(&[], "Release");
    let debug = resolve(&[], "Debug");

    assert_eq!(
        identity_of(&release, "terminus_cmake"),
        identity_of(&debug, "terminus_cmake")
    );
    assert_ne!(identity_of(&release, "zlib"), identity_of(&debug, "zlib"));
    assert_ne!(identity_of(&release, "app"), identity_of(&debug, "app"));
}

#[test]
fn test_dependency_options_reach_dependent_identity() {
    let shared_zlib = resolve(&[], "Release");
    let static_zlib = resolve(&["zlib:shared=False"], "Release");

    assert_ne!(identity_of(&shared_zlib, "zlib"), identity_of(&static_zlib, "zlib"));
    assert_ne!(identity_of(&shared_zlib, "app"), identity_of(&static_zlib, "app"));
}

#[test]
fn test_tool_identity_does_not_reach_dependent() {
    let graph = resolve(&[], "Release");
    let app = graph.root();
    let mut without_tool = graph.clone();
    without_tool
        .node_mut(graph.find("terminus_cmake").unwrap().id)
        .unwrap()
        .identity = Some(kiln_hash::Hash::from_data(b"other"));

    let deps: Vec<_> = graph
        .dependencies(0)
        .map(|edge| {
            let dep = without_tool.node(edge.to).unwrap();
            kiln_identity::DependencyIdentity {
                name: dep.name().to_string(),
                kind: edge.kind,
                identity: dep.identity.unwrap(),
            }
        })
        .collect();

    assert_eq!(kiln_identity::compute(app, &deps).unwrap(), app.identity.unwrap());
}
