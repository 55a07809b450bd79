//! Integration tests for the requirement resolver

use kiln_errors::{Error, ResolveError};
use kiln_events::{AppEvent, ResolverEvent};
use kiln_index::RecipeIndex;
use kiln_recipe::Recipe;
use kiln_resolver::{Context, ResolveOptions, Resolver};
use kiln_types::RequirementKind;
use std::sync::Arc;

fn recipe(yaml: &str) -> Recipe {
    kiln_recipe::load(yaml).unwrap()
}

/// A -> B(^1.0) -> D(>=2.0), A -(test)-> C
fn abcd_index() -> (Arc<Recipe>, RecipeIndex) {
    let root = Arc::new(recipe(
        "name: a\nversion: '1.0.0'\nrequires: ['b/^1.0']\ntest_requires: [c/1.0.0]\n",
    ));
    let index = RecipeIndex::new()
        .with(recipe("name: b\nversion: '1.2.0'\nrequires: ['d/>=2.0']\n"))
        .with(recipe("name: b\nversion: '2.0.0'\n"))
        .with(recipe("name: c\nversion: '1.0.0'\n"))
        .with(recipe("name: d\nversion: '1.9.0'\n"))
        .with(recipe("name: d\nversion: '2.1.0'\n"));
    (root, index)
}

fn names(resolution: &kiln_resolver::Resolution) -> Vec<String> {
    resolution
        .nodes_in_order()
        .iter()
        .map(|node| node.to_string())
        .collect()
}

#[test]
fn test_resolves_regular_closure_without_tests() {
    let (root, index) = abcd_index();
    let resolution = Resolver::new(&index).resolve(root).unwrap();

    assert_eq!(names(&resolution), vec!["d/2.1.0", "b/1.2.0", "a/1.0.0"]);
    assert!(resolution.graph.find("c").is_none());
    assert_eq!(resolution.restarts, 0);
}

#[test]
fn test_test_requirements_on_request() {
    let (root, index) = abcd_index();
    let resolution = Resolver::new(&index)
        .with_options(ResolveOptions {
            include_test_requirements: true,
            ..ResolveOptions::default()
        })
        .resolve(root)
        .unwrap();

    let c = resolution.graph.find("c").unwrap();
    assert_eq!(c.context, Context::Test);
    assert!(!resolution.graph.regular_closure(0).contains(&c.id));
}

#[test]
fn test_tools_never_enter_regular_closure() {
    let root = Arc::new(recipe(
        "name: app\nversion: '1.0'\nrequires: [lib/1.0]\ntool_requires: [cmake_helpers/1.0]\n",
    ));
    let index = RecipeIndex::new()
        .with(recipe(
            "name: lib\nversion: '1.0'\ntool_requires: [protoc/3.0]\n",
        ))
        .with(recipe("name: cmake_helpers\nversion: '1.0'\n"))
        .with(recipe("name: protoc\nversion: '3.0'\nrequires: [zlib/1.3]\n"))
        .with(recipe("name: zlib\nversion: '1.3'\n"));

    let resolution = Resolver::new(&index).resolve(root).unwrap();
    let graph = &resolution.graph;

    let protoc = graph.find("protoc").unwrap();
    assert_eq!(protoc.context, Context::BuildTool);
    // Regular dependencies of a tool inherit the tool context
    assert_eq!(graph.find("zlib").unwrap().context, Context::BuildTool);

    let closure: Vec<&str> = graph
        .regular_closure(0)
        .into_iter()
        .map(|id| graph.node(id).unwrap().name())
        .collect();
    assert_eq!(closure, vec!["lib"]);

    let lib = graph.find("lib").unwrap().id;
    assert!(graph.regular_closure(lib).is_empty());
    assert!(graph
        .dependencies(lib)
        .any(|edge| edge.kind == RequirementKind::BuildTool && edge.to == protoc.id));
}

#[test]
fn test_overlapping_constraints_widen() {
    let root = Arc::new(recipe(
        "name: a\nversion: '1.0'\nrequires: ['b/^1.0', d/1.0]\n",
    ));
    let index = RecipeIndex::new()
        .with(recipe("name: b\nversion: '1.0.0'\n"))
        .with(recipe("name: b\nversion: '1.3.0'\n"))
        .with(recipe("name: b\nversion: '1.6.0'\n"))
        .with(recipe(
            "name: d\nversion: '1.0'\nrequires: ['b/>=1.2,<1.5']\n",
        ));

    let resolution = Resolver::new(&index).resolve(root).unwrap();
    assert_eq!(
        resolution.graph.find("b").unwrap().recipe.version.to_string(),
        "1.3.0"
    );
    assert_eq!(resolution.restarts, 1);
}

#[test]
fn test_disjoint_constraints_conflict() {
    let root = Arc::new(recipe(
        "name: a\nversion: '1.0'\nrequires: [b/1.0.0, d/1.0]\n",
    ));
    let index = RecipeIndex::new()
        .with(recipe("name: b\nversion: '1.0.0'\n"))
        .with(recipe("name: b\nversion: '2.0.0'\n"))
        .with(recipe("name: d\nversion: '1.0'\nrequires: [b/2.0.0]\n"));

    let err = Resolver::new(&index).resolve(root).unwrap_err();
    match err {
        Error::Resolve(ResolveError::VersionConflict {
            name, required_by, ..
        }) => {
            assert_eq!(name, "b");
            assert_eq!(required_by, vec!["a/1.0.0", "d/1.0.0"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_single_unsatisfiable_constraint_is_missing() {
    let root = Arc::new(recipe("name: a\nversion: '1.0'\nrequires: ['d/>=5.0']\n"));
    let index = RecipeIndex::new().with(recipe("name: d\nversion: '2.1.0'\n"));

    match Resolver::new(&index).resolve(root).unwrap_err() {
        Error::Resolve(ResolveError::MissingRequirement {
            name, required_by, ..
        }) => {
            assert_eq!(name, "d");
            assert_eq!(required_by, "a/1.0.0");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_disabled_requirement_is_skipped() {
    let root = Arc::new(recipe(
        "name: a\nversion: '1.0'\nrequires:\n  - b/1.0\n  - { ref: gdal/3.4.3, enabled: false }\n",
    ));
    let index = RecipeIndex::new().with(recipe("name: b\nversion: '1.0'\n"));

    let resolution = Resolver::new(&index).resolve(root).unwrap();
    assert_eq!(resolution.graph.len(), 2);
    assert!(resolution.graph.find("gdal").is_none());
}

#[test]
fn test_missing_requirement() {
    let root = Arc::new(recipe("name: a\nversion: '1.0'\nrequires: [ghost/1.0]\n"));
    let index = RecipeIndex::new();

    let err = Resolver::new(&index).resolve(root).unwrap_err();
    assert!(matches!(
        err,
        Error::Resolve(ResolveError::MissingRequirement { ref name, .. }) if name == "ghost"
    ));
}

#[test]
fn test_cycle_detected() {
    let root = Arc::new(recipe("name: a\nversion: '1.0'\nrequires: [b/1.0]\n"));
    let index = RecipeIndex::new().with(recipe("name: b\nversion: '1.0'\nrequires: [a/1.0]\n"));

    let err = Resolver::new(&index).resolve(root).unwrap_err();
    match err {
        Error::Resolve(ResolveError::CycleDetected { path }) => {
            assert_eq!(path, vec!["a", "b", "a"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_requiring_another_root_version_is_a_cycle() {
    let root = Arc::new(recipe("name: a\nversion: '1.0'\nrequires: [b/1.0]\n"));
    let index = RecipeIndex::new()
        .with(recipe("name: a\nversion: '2.0'\n"))
        .with(recipe("name: b\nversion: '1.0'\nrequires: [a/2.0]\n"));

    match Resolver::new(&index).resolve(root).unwrap_err() {
        Error::Resolve(ResolveError::CycleDetected { path }) => {
            assert_eq!(path, vec!["a", "b", "a"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_self_requirement_is_a_cycle() {
    let root = Arc::new(recipe("name: a\nversion: '1.0'\nrequires: [a/1.0]\n"));
    let err = Resolver::new(&RecipeIndex::new()).resolve(root).unwrap_err();
    assert!(matches!(
        err,
        Error::Resolve(ResolveError::CycleDetected { .. })
    ));
}

#[tokio::test]
async fn test_emits_resolution_events() {
    let (tx, mut rx) = kiln_events::channel();
    let (root, index) = abcd_index();
    Resolver::new(&index)
        .with_event_sender(tx)
        .resolve(root)
        .unwrap();

    let mut started = false;
    let mut completed = None;
    while let Ok(message) = rx.try_recv() {
        match message.event {
            AppEvent::Resolver(ResolverEvent::ResolutionStarted { .. }) => started = true,
            AppEvent::Resolver(ResolverEvent::ResolutionCompleted { nodes, .. }) => {
                completed = Some(nodes);
            }
            _ => {}
        }
    }
    assert!(started);
    assert_eq!(completed, Some(3));
}
