#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Package identities for kiln
//!
//! An identity is the BLAKE3 digest of a canonical JSON document describing
//! everything that makes a built package distinct: name, version, final
//! options, the settings the recipe declares and the identities of its
//! regular dependencies. Build-tool and test dependencies only count when
//! the recipe sets `package_id_include_build_requirements`.
//!
//! A recipe with `package_id: clear` is identified by name and version
//! alone.

use kiln_errors::Error;
use kiln_hash::Hash;
use kiln_recipe::PackageIdMode;
use kiln_resolver::{DependencyGraph, ResolvedNode};
use kiln_types::{OptionSet, RequirementKind, Settings};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Fingerprint of a fully configured package
pub type PackageIdentity = Hash;

/// Identity of one dependency of the node being fingerprinted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyIdentity {
    pub name: String,
    pub kind: RequirementKind,
    pub identity: PackageIdentity,
}

#[derive(Serialize)]
struct IdentityDocument<'a> {
    name: &'a str,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a OptionSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<&'a Settings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    requires: Option<BTreeMap<&'a str, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build_requires: Option<BTreeMap<&'a str, String>>,
}

/// Compute the identity of `node` from its options, settings and the
/// identities of its dependencies
///
/// # Errors
///
/// Returns an error if the identity document cannot be serialized.
pub fn compute(
    node: &ResolvedNode,
    dependencies: &[DependencyIdentity],
) -> Result<PackageIdentity, Error> {
    let recipe = &node.recipe;

    let document = match recipe.package_id {
        PackageIdMode::Clear => IdentityDocument {
            name: &recipe.name,
            version: recipe.version.to_string(),
            options: None,
            settings: None,
            requires: None,
            build_requires: None,
        },
        PackageIdMode::Full => {
            let of_kind = |wanted: fn(RequirementKind) -> bool| {
                dependencies
                    .iter()
                    .filter(|dep| wanted(dep.kind))
                    .map(|dep| (dep.name.as_str(), dep.identity.to_hex()))
                    .collect::<BTreeMap<_, _>>()
            };

            IdentityDocument {
                name: &recipe.name,
                version: recipe.version.to_string(),
                options: Some(&node.options),
                settings: Some(&node.settings),
                requires: Some(of_kind(|kind| kind == RequirementKind::Regular)),
                build_requires: recipe
                    .package_id_include_build_requirements
                    .then(|| of_kind(RequirementKind::is_session_local)),
            }
        }
    };

    Hash::from_canonical(&document)
}

/// Restrict session settings to the keys a recipe declares
#[must_use]
pub fn restrict_settings(declared: &[String], session: &Settings) -> Settings {
    session
        .iter()
        .filter(|(key, _)| declared.iter().any(|d| d == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Fill in settings and identity of every node, dependencies first
///
/// Options must already be propagated.
///
/// # Errors
///
/// Returns an error if an identity cannot be computed.
pub fn annotate(graph: &mut DependencyGraph, session: &Settings) -> Result<(), Error> {
    for id in graph.post_order() {
        let Some(node) = graph.node(id) else {
            continue;
        };
        let settings = restrict_settings(&node.recipe.settings, session);

        let mut seen = HashSet::new();
        let dependencies: Vec<DependencyIdentity> = graph
            .dependencies(id)
            .filter(|edge| seen.insert(edge.to))
            .filter_map(|edge| {
                let dep = graph.node(edge.to)?;
                Some(DependencyIdentity {
                    name: dep.name().to_string(),
                    kind: edge.kind,
                    identity: dep.identity?,
                })
            })
            .collect();

        if let Some(node) = graph.node_mut(id) {
            node.settings = settings;
            let identity = compute(node, &dependencies)?;
            tracing::debug!(node = %node, identity = %identity.short(), "package identity");
            node.identity = Some(identity);
        }
    }

    Ok(())
}
