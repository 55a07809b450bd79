//! Toolchain payload assembled from a graph node and installed dependencies

use crate::toolchain;
use kiln_errors::{BuildError, Error};
use kiln_hash::Hash;
use kiln_resolver::{DependencyGraph, NodeId, ResolvedNode};
use kiln_types::{RequirementKind, Version};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// A dependency that finished its lifecycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    pub version: Version,
    pub identity: Hash,
    /// Install prefix inside the artifact cache
    pub prefix: PathBuf,
    pub libs: Vec<String>,
}

/// One dependency as seen by the build tool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub name: String,
    pub version: String,
    pub identity: String,
    pub kind: RequirementKind,
    pub prefix: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub lib_dirs: Vec<PathBuf>,
    pub libs: Vec<String>,
}

impl DependencyEntry {
    fn new(package: &InstalledPackage, kind: RequirementKind) -> Self {
        Self {
            name: package.name.clone(),
            version: package.version.to_string(),
            identity: package.identity.to_hex(),
            kind,
            prefix: package.prefix.clone(),
            include_dirs: vec![package.prefix.join("include")],
            lib_dirs: vec![package.prefix.join("lib")],
            libs: package.libs.clone(),
        }
    }
}

/// Serialized form of `kiln_deps.json`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepsManifest {
    pub package: String,
    pub identity: Option<String>,
    pub dependencies: Vec<DependencyEntry>,
}

/// Everything the build tool needs to configure one package
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolchainPayload {
    /// `name/version`
    pub package: String,
    pub identity: Option<Hash>,
    /// Cache variables, in name order
    pub variables: BTreeMap<String, String>,
    /// Regular closure first, then direct build-tool and test dependencies
    pub dependencies: Vec<DependencyEntry>,
}

impl ToolchainPayload {
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn manifest(&self) -> DepsManifest {
        DepsManifest {
            package: self.package.clone(),
            identity: self.identity.map(|h| h.to_hex()),
            dependencies: self.dependencies.clone(),
        }
    }
}

/// Build the toolchain payload for `node`
///
/// `installed` maps package names to finished dependencies; every
/// dependency the node links against or builds with must be present.
///
/// # Errors
///
/// Returns `BuildError::GeneratorFailed` if a dependency is not installed.
pub fn generate(
    node: &ResolvedNode,
    graph: &DependencyGraph,
    installed: &BTreeMap<String, InstalledPackage>,
) -> Result<ToolchainPayload, Error> {
    let mut dependencies = Vec::new();
    for (id, kind) in build_inputs(graph, node.id) {
        let Some(dep) = graph.node(id) else {
            continue;
        };
        let package = installed
            .get(dep.name())
            .ok_or_else(|| BuildError::GeneratorFailed {
                message: format!("dependency {dep} of {node} is not installed"),
            })?;
        dependencies.push(DependencyEntry::new(package, kind));
    }

    Ok(ToolchainPayload {
        package: node.to_string(),
        identity: node.identity,
        variables: toolchain::variables(node, &dependencies),
        dependencies,
    })
}

/// Regular closure of `id`, then its direct build-tool and test dependencies
///
/// These are the nodes that must be installed before `id` can be generated.
#[must_use]
pub fn build_inputs(graph: &DependencyGraph, id: NodeId) -> Vec<(NodeId, RequirementKind)> {
    let mut inputs: Vec<_> = graph
        .regular_closure(id)
        .into_iter()
        .map(|dep| (dep, RequirementKind::Regular))
        .collect();

    let mut seen: HashSet<NodeId> = inputs.iter().map(|(dep, _)| *dep).collect();
    for edge in graph.dependencies(id) {
        if edge.kind != RequirementKind::Regular && seen.insert(edge.to) {
            inputs.push((edge.to, edge.kind));
        }
    }

    inputs
}
