//! YAML recipe parser with validation

use crate::model::{scalar_to_string, RawDomain, RawOption, RawRecipe, RawRequirement};
use crate::{DependencyDefault, OptionDecl, PackageInfo, Recipe, RecipeMetadata, Requirement};
use kiln_errors::{Error, RecipeError};
use kiln_types::{
    is_valid_package_name, parse_version, OptionDomain, OptionSet, OptionValue, PackageRef,
    RequirementKind,
};
use serde_yml::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const UNNAMED: &str = "<unnamed>";

/// Parse and validate a recipe from YAML text
///
/// # Errors
///
/// Returns `RecipeError::Malformed` if:
/// - The YAML is invalid
/// - `name` or `version` is missing or unparsable
/// - An option domain is empty or a default lies outside its domain
/// - A requirement reference or constraint does not parse
/// - A `default_options` key is neither a declared option nor `pattern:option`
pub fn load(raw: &str) -> Result<Recipe, Error> {
    let raw: RawRecipe = serde_yml::from_str(raw)
        .map_err(|e| RecipeError::malformed(UNNAMED, format!("failed to parse YAML: {e}")))?;

    Ok(validate(raw)?)
}

/// Load a recipe file, remembering its directory for `source_dir`
///
/// # Errors
///
/// Returns `RecipeError::NotFound` if the file cannot be read, otherwise the
/// errors of [`load`].
pub async fn load_file(path: &Path) -> Result<Recipe, Error> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|_| RecipeError::NotFound {
            path: path.display().to_string(),
        })?;

    let mut recipe = load(&content).map_err(|e| match e {
        Error::Recipe(RecipeError::Malformed { recipe, message }) if recipe == UNNAMED => {
            RecipeError::malformed(path.display().to_string(), message).into()
        }
        other => other,
    })?;
    recipe.recipe_dir = path.parent().map(Path::to_path_buf);

    tracing::debug!(recipe = %recipe.id(), path = %path.display(), "loaded recipe");
    Ok(recipe)
}

fn validate(raw: RawRecipe) -> Result<Recipe, RecipeError> {
    let name = match raw.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Err(RecipeError::malformed(UNNAMED, "missing name")),
    };
    if !is_valid_package_name(&name) {
        return Err(RecipeError::malformed(
            &name,
            format!("invalid package name '{name}'"),
        ));
    }

    let version_text = raw
        .version
        .as_ref()
        .and_then(scalar_to_string)
        .ok_or_else(|| RecipeError::malformed(&name, "missing version"))?;
    let version =
        parse_version(&version_text).map_err(|e| RecipeError::malformed(&name, e.to_string()))?;

    let mut own_defaults = BTreeMap::new();
    let mut dependency_defaults = Vec::new();
    for (key, value) in &raw.default_options {
        let value = option_value(&name, key, value)?;
        match key.rsplit_once(':') {
            Some((pattern, option)) => {
                let (pattern, option) = (pattern.trim(), option.trim());
                if pattern.is_empty() || option.is_empty() {
                    return Err(RecipeError::malformed(
                        &name,
                        format!("default_options key '{key}' is not of the form pattern:option"),
                    ));
                }
                dependency_defaults.push(DependencyDefault {
                    pattern: pattern.to_string(),
                    option: option.to_string(),
                    value,
                });
            }
            None => {
                if !raw.options.contains_key(key) {
                    return Err(RecipeError::malformed(
                        &name,
                        format!(
                            "default_options key '{key}' is not of the form pattern:option and names no declared option"
                        ),
                    ));
                }
                own_defaults.insert(key.clone(), value);
            }
        }
    }

    let mut options = BTreeMap::new();
    for (option, decl) in &raw.options {
        options.insert(
            option.clone(),
            option_decl(&name, option, decl, own_defaults.remove(option))?,
        );
    }

    let mut requirements = Vec::new();
    for (kind, entries) in [
        (RequirementKind::Regular, &raw.requires),
        (RequirementKind::BuildTool, &raw.tool_requires),
        (RequirementKind::Test, &raw.test_requires),
    ] {
        let mut seen = HashSet::new();
        for entry in entries {
            let requirement = requirement(&name, kind, entry)?;
            if !seen.insert(requirement.reference.name.clone()) {
                return Err(RecipeError::malformed(
                    &name,
                    format!(
                        "duplicate {kind} requirement '{}'",
                        requirement.reference.name
                    ),
                ));
            }
            requirements.push(requirement);
        }
    }

    Ok(Recipe {
        name,
        version,
        metadata: RecipeMetadata {
            description: raw.description,
            url: raw.url,
            license: raw.license,
            author: raw.author,
            topics: raw.topics,
        },
        options,
        dependency_defaults,
        requirements,
        settings: raw.settings,
        package_info: PackageInfo {
            libs: raw.package_info.libs,
        },
        package_id: raw.package_id,
        package_id_include_build_requirements: raw.package_id_include_build_requirements,
        source_dir: raw.source_dir,
        recipe_dir: None,
    })
}

fn option_value(recipe: &str, key: &str, value: &Value) -> Result<OptionValue, RecipeError> {
    scalar_to_string(value)
        .map(OptionValue::new)
        .ok_or_else(|| RecipeError::malformed(recipe, format!("value of '{key}' must be a scalar")))
}

fn option_decl(
    recipe: &str,
    option: &str,
    decl: &RawOption,
    default_override: Option<OptionValue>,
) -> Result<OptionDecl, RecipeError> {
    let (raw_domain, inline_default) = match decl {
        RawOption::List(values) => (RawDomain::List(values.clone()), None),
        RawOption::Detailed { values, default } => (values.clone(), default.as_ref()),
    };

    let domain = match raw_domain {
        RawDomain::Keyword(keyword) if keyword.eq_ignore_ascii_case("any") => OptionDomain::Any,
        RawDomain::Keyword(keyword) => {
            return Err(RecipeError::malformed(
                recipe,
                format!("option '{option}' has unknown domain '{keyword}'"),
            ))
        }
        RawDomain::List(values) => {
            let values = values
                .iter()
                .map(|v| option_value(recipe, option, v))
                .collect::<Result<Vec<_>, _>>()?;
            if values.is_empty() {
                return Err(RecipeError::malformed(
                    recipe,
                    format!("option '{option}' has an empty domain"),
                ));
            }
            OptionDomain::Values(values)
        }
    };

    let default = match (default_override, inline_default) {
        (Some(value), _) => value,
        (None, Some(value)) => option_value(recipe, option, value)?,
        (None, None) => match &domain {
            OptionDomain::Values(values) => values[0].clone(),
            OptionDomain::Any => {
                return Err(RecipeError::malformed(
                    recipe,
                    format!("option '{option}' accepts ANY value and needs an explicit default"),
                ))
            }
        },
    };

    if !domain.contains(&default) {
        return Err(RecipeError::malformed(
            recipe,
            format!("default '{default}' of option '{option}' is not one of: {domain}"),
        ));
    }

    Ok(OptionDecl { domain, default })
}

fn requirement(
    recipe: &str,
    kind: RequirementKind,
    entry: &RawRequirement,
) -> Result<Requirement, RecipeError> {
    let (reference, enabled, raw_options) = match entry {
        RawRequirement::Ref(reference) => (reference.as_str(), true, None),
        RawRequirement::Detailed {
            reference,
            enabled,
            options,
        } => (reference.as_str(), *enabled, Some(options)),
    };

    let reference = PackageRef::parse(reference).map_err(|e| {
        RecipeError::malformed(recipe, format!("{kind} requirement: {e}"))
    })?;

    let mut options = OptionSet::new();
    if let Some(raw_options) = raw_options {
        for (option, value) in raw_options {
            options.insert(option.clone(), option_value(recipe, option, value)?);
        }
    }

    Ok(Requirement {
        reference,
        kind,
        enabled,
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PackageIdMode;

    const TERMINUS_IMAGE: &str = r#"
name: terminus_image
version: "0.0.6"
license: Terminus Proprietary
description: High-Performance Image-Processing API
topics: [terminus, cmake, build]
settings: [os, compiler, build_type, arch]
options:
  shared: [true, false]
  with_tests: [true, false]
  with_docs: [true, false]
  with_coverage: [true, false]
default_options:
  shared: true
  with_tests: true
  with_docs: true
  with_coverage: false
  "boost/*:shared": true
  "terminus_log/*:shared": true
requires:
  - boost/1.86.0
  - { ref: gdal/3.4.3, enabled: false }
  - nlohmann_json/3.11.3
tool_requires:
  - terminus_cmake/1.0.5
test_requires:
  - gtest/1.15.0
package_info:
  libs: [terminus_image]
package_id: clear
"#;

    #[test]
    fn test_parse_full_recipe() {
        let recipe = load(TERMINUS_IMAGE).unwrap();
        assert_eq!(recipe.id().to_string(), "terminus_image/0.0.6");
        assert_eq!(recipe.options.len(), 4);
        assert_eq!(
            recipe.options["with_coverage"].default,
            OptionValue::boolean(false)
        );
        assert_eq!(recipe.dependency_defaults.len(), 2);
        assert_eq!(recipe.dependency_defaults[0].pattern, "boost/*");
        assert_eq!(recipe.requirements.len(), 5);
        assert!(!recipe.requirements[1].enabled);
        assert_eq!(recipe.requirements_of(RequirementKind::Test).count(), 1);
        assert_eq!(recipe.package_id, PackageIdMode::Clear);
        assert_eq!(recipe.package_info.libs, vec!["terminus_image"]);
        assert_eq!(recipe.settings.len(), 4);
    }

    #[test]
    fn test_two_component_version() {
        let recipe = load("name: a\nversion: 1.2\n").unwrap();
        assert_eq!(recipe.version.to_string(), "1.2.0");
    }

    #[test]
    fn test_missing_name_or_version() {
        assert!(load("version: '1.0.0'").is_err());
        assert!(load("name: a").is_err());
        assert!(load("name: a\nversion: banana").is_err());
    }

    #[test]
    fn test_default_outside_domain() {
        let err = load(
            "name: a\nversion: '1.0'\noptions:\n  shared: { values: [true, false], default: maybe }\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("not one of"));
    }

    #[test]
    fn test_empty_domain() {
        assert!(load("name: a\nversion: '1.0'\noptions:\n  shared: []\n").is_err());
    }

    #[test]
    fn test_any_domain_requires_default() {
        assert!(load("name: a\nversion: '1.0'\noptions:\n  flags: { values: ANY }\n").is_err());
        let recipe =
            load("name: a\nversion: '1.0'\noptions:\n  flags: { values: ANY, default: '-O2' }\n")
                .unwrap();
        assert_eq!(recipe.options["flags"].domain, OptionDomain::Any);
    }

    #[test]
    fn test_bad_default_options_key() {
        assert!(load("name: a\nversion: '1.0'\ndefault_options:\n  shared: true\n").is_err());
        assert!(load("name: a\nversion: '1.0'\ndefault_options:\n  ':shared': true\n").is_err());
    }

    #[test]
    fn test_bad_requirement() {
        assert!(load("name: a\nversion: '1.0'\nrequires: ['b/not a version']\n").is_err());
        assert!(load("name: a\nversion: '1.0'\nrequires: [b/1.0, b/2.0]\n").is_err());
    }

    #[test]
    fn test_edge_options() {
        let recipe = load(
            "name: a\nversion: '1.0'\nrequires:\n  - { ref: 'b/^1.0', options: { shared: true } }\n",
        )
        .unwrap();
        let edge = &recipe.requirements[0];
        assert_eq!(edge.options["shared"], OptionValue::boolean(true));
        assert!(edge.reference.version_spec.matches(&"1.4.0".parse().unwrap()));
    }
}
