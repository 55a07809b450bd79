//! Raw YAML recipe shape
//!
//! These structs mirror the file format one to one and carry no invariants;
//! [`crate::parser`] turns them into a validated [`crate::Recipe`].

use serde::Deserialize;
use serde_yml::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::PackageIdMode;

/// Complete YAML recipe structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecipe {
    #[serde(default)]
    pub name: Option<String>,

    /// Kept as a YAML value so unquoted `1.0` survives as text
    #[serde(default)]
    pub version: Option<Value>,

    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default)]
    pub settings: Vec<String>,

    #[serde(default)]
    pub options: BTreeMap<String, RawOption>,

    /// Own defaults (`shared`) and dependency defaults (`boost/*:shared`)
    #[serde(default)]
    pub default_options: BTreeMap<String, Value>,

    #[serde(default)]
    pub requires: Vec<RawRequirement>,
    #[serde(default)]
    pub tool_requires: Vec<RawRequirement>,
    #[serde(default)]
    pub test_requires: Vec<RawRequirement>,

    #[serde(default)]
    pub package_info: RawPackageInfo,

    #[serde(default)]
    pub package_id: PackageIdMode,
    #[serde(default)]
    pub package_id_include_build_requirements: bool,

    #[serde(default)]
    pub source_dir: Option<PathBuf>,
}

/// Option declaration: either a bare value list or a mapping with a default
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawOption {
    /// `shared: [true, false]`
    List(Vec<Value>),
    /// `shared: { values: [true, false], default: true }`
    Detailed {
        values: RawDomain,
        #[serde(default)]
        default: Option<Value>,
    },
}

/// Value domain of an option
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawDomain {
    /// The literal `ANY`
    Keyword(String),
    List(Vec<Value>),
}

/// Requirement entry: `boost/1.86.0` or a mapping
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawRequirement {
    Ref(String),
    Detailed {
        #[serde(rename = "ref")]
        reference: String,
        #[serde(default = "default_enabled")]
        enabled: bool,
        #[serde(default)]
        options: BTreeMap<String, Value>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPackageInfo {
    #[serde(default)]
    pub libs: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

/// Render a YAML scalar as text; `None` for sequences, mappings and null
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
