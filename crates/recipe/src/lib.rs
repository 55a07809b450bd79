#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Recipe model for kiln
//!
//! A recipe declares a library's identity, its options, its requirements
//! and the settings it is sensitive to. Recipes are written in YAML:
//!
//! ```yaml
//! name: terminus_image
//! version: "0.0.6"
//! settings: [os, compiler, build_type, arch]
//! options:
//!   shared: [true, false]
//!   with_tests: { values: [true, false], default: true }
//! default_options:
//!   shared: true
//!   "boost/*:shared": true
//! requires:
//!   - boost/1.86.0
//!   - { ref: gdal/3.4.3, enabled: false }
//! tool_requires: [terminus_cmake/1.0.5]
//! test_requires: [gtest/1.15.0]
//! package_info: { libs: [terminus_image] }
//! package_id: clear
//! ```

pub mod model;
pub mod parser;

pub use parser::{load, load_file};

use kiln_types::{
    OptionDomain, OptionSet, OptionValue, PackageId, PackageRef, RequirementKind, Version,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// How the package identity is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageIdMode {
    /// Options, settings and dependency identities all count
    #[default]
    Full,
    /// Only name and version count
    Clear,
}

/// Descriptive fields that do not influence resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeMetadata {
    pub description: Option<String>,
    pub url: Option<String>,
    pub license: Option<String>,
    pub author: Option<String>,
    pub topics: Vec<String>,
}

/// A declared option with its domain and default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDecl {
    pub domain: OptionDomain,
    pub default: OptionValue,
}

/// `pattern:option = value` default a recipe sets on its dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDefault {
    /// Package pattern (`boost/*`, `boost`, `*`)
    pub pattern: String,
    pub option: String,
    pub value: OptionValue,
}

/// One dependency edge declared by a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub reference: PackageRef,
    pub kind: RequirementKind,
    /// Disabled requirements stay in the recipe but are never resolved
    pub enabled: bool,
    /// Option values forced onto the dependency through this edge
    pub options: OptionSet,
}

impl Requirement {
    /// Enabled requirement without option overrides
    #[must_use]
    pub fn new(reference: PackageRef, kind: RequirementKind) -> Self {
        Self {
            reference,
            kind,
            enabled: true,
            options: OptionSet::new(),
        }
    }
}

/// Libraries exported to consumers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub libs: Vec<String>,
}

/// A validated recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub version: Version,
    pub metadata: RecipeMetadata,
    pub options: BTreeMap<String, OptionDecl>,
    /// Declaration order is preserved; later entries win on conflicts
    pub dependency_defaults: Vec<DependencyDefault>,
    /// Regular requirements first, then build-tool, then test, each in
    /// declaration order
    pub requirements: Vec<Requirement>,
    /// Setting keys the recipe is sensitive to
    pub settings: Vec<String>,
    pub package_info: PackageInfo,
    pub package_id: PackageIdMode,
    pub package_id_include_build_requirements: bool,
    pub source_dir: Option<PathBuf>,
    /// Directory the recipe file was loaded from
    #[serde(skip)]
    pub recipe_dir: Option<PathBuf>,
}

impl Recipe {
    /// Bare recipe with no options and no requirements
    #[must_use]
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            metadata: RecipeMetadata::default(),
            options: BTreeMap::new(),
            dependency_defaults: Vec::new(),
            requirements: Vec::new(),
            settings: Vec::new(),
            package_info: PackageInfo::default(),
            package_id: PackageIdMode::Full,
            package_id_include_build_requirements: false,
            source_dir: None,
            recipe_dir: None,
        }
    }

    /// `name/version` identifier
    #[must_use]
    pub fn id(&self) -> PackageId {
        PackageId::new(self.name.clone(), self.version.clone())
    }

    /// Requirements of one kind, including disabled ones
    pub fn requirements_of(&self, kind: RequirementKind) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().filter(move |r| r.kind == kind)
    }

    /// Option set holding every declared default
    #[must_use]
    pub fn default_option_set(&self) -> OptionSet {
        self.options
            .iter()
            .map(|(name, decl)| (name.clone(), decl.default.clone()))
            .collect()
    }

    /// Whether the recipe declares `option`
    #[must_use]
    pub fn declares_option(&self, option: &str) -> bool {
        self.options.contains_key(option)
    }

    /// Absolute-ish source directory: `source_dir` relative to the recipe
    /// directory, or the recipe directory itself
    #[must_use]
    pub fn resolved_source_dir(&self) -> Option<PathBuf> {
        match (&self.source_dir, &self.recipe_dir) {
            (Some(src), _) if src.is_absolute() => Some(src.clone()),
            (Some(src), Some(dir)) => Some(dir.join(src)),
            (Some(src), None) => Some(src.clone()),
            (None, Some(dir)) => Some(dir.clone()),
            (None, None) => None,
        }
    }
}
