//! CMake toolchain variables and file rendering

use crate::payload::{DependencyEntry, ToolchainPayload};
use kiln_resolver::ResolvedNode;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Cache variable name for a boolean option: `<PACKAGE>_<OPTION>`, with a
/// `with_` prefix turned into `ENABLE_`
///
/// `option_variable("terminus_image", "with_tests")` is
/// `TERMINUS_IMAGE_ENABLE_TESTS`.
#[must_use]
pub fn option_variable(package: &str, option: &str) -> String {
    let option = match option.strip_prefix("with_") {
        Some(rest) => format!("ENABLE_{rest}"),
        None => option.to_string(),
    };
    format!("{}_{}", identifier(package), identifier(&option))
}

fn identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn on_off(value: bool) -> String {
    String::from(if value { "ON" } else { "OFF" })
}

pub(crate) fn variables(
    node: &ResolvedNode,
    dependencies: &[DependencyEntry],
) -> BTreeMap<String, String> {
    let recipe = &node.recipe;
    let mut vars = BTreeMap::new();

    vars.insert("KILN_PKG_NAME".to_string(), recipe.name.clone());
    vars.insert("KILN_PKG_VERSION".to_string(), recipe.version.to_string());
    vars.insert(
        "KILN_PKG_DESCRIPTION".to_string(),
        recipe.metadata.description.clone().unwrap_or_default(),
    );
    vars.insert(
        "KILN_PKG_URL".to_string(),
        recipe.metadata.url.clone().unwrap_or_default(),
    );
    if let Some(identity) = node.identity {
        vars.insert("KILN_PKG_IDENTITY".to_string(), identity.to_hex());
    }

    if let Some(build_type) = node.settings.get("build_type") {
        vars.insert("CMAKE_BUILD_TYPE".to_string(), build_type.clone());
    }

    for (option, value) in &node.options {
        let Some(flag) = value.as_bool() else {
            continue;
        };
        if option == "shared" {
            vars.insert("BUILD_SHARED_LIBS".to_string(), on_off(flag));
        } else {
            vars.insert(option_variable(&recipe.name, option), on_off(flag));
        }
    }

    if !dependencies.is_empty() {
        let prefixes: Vec<String> = dependencies
            .iter()
            .map(|dep| dep.prefix.display().to_string())
            .collect();
        vars.insert("CMAKE_PREFIX_PATH".to_string(), prefixes.join(";"));
    }

    vars
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Render `kiln_toolchain.cmake`
#[must_use]
pub fn render_toolchain(payload: &ToolchainPayload) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Generated by kiln for {}. Do not edit.", payload.package);
    out.push('\n');

    for (name, value) in &payload.variables {
        let kind = if value == "ON" || value == "OFF" {
            "BOOL"
        } else {
            "STRING"
        };
        let _ = writeln!(
            out,
            "set({name} {} CACHE {kind} \"Defined by kiln\")",
            quote(value)
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_variable() {
        assert_eq!(
            option_variable("terminus_image", "with_tests"),
            "TERMINUS_IMAGE_ENABLE_TESTS"
        );
        assert_eq!(option_variable("lib-png", "fPIC"), "LIB_PNG_FPIC");
    }

    #[test]
    fn test_quote_escapes_cmake_specials() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote("${HOME}"), "\"\\${HOME}\"");
    }

    #[test]
    fn test_render_toolchain() {
        let payload = ToolchainPayload {
            package: "zlib/1.3.1".to_string(),
            identity: None,
            variables: BTreeMap::from([
                ("BUILD_SHARED_LIBS".to_string(), "OFF".to_string()),
                ("KILN_PKG_NAME".to_string(), "zlib".to_string()),
            ]),
            dependencies: Vec::new(),
        };

        let rendered = render_toolchain(&payload);
        assert!(rendered.starts_with("# Generated by kiln for zlib/1.3.1"));
        assert!(rendered.contains("set(BUILD_SHARED_LIBS \"OFF\" CACHE BOOL \"Defined by kiln\")"));
        assert!(rendered.contains("set(KILN_PKG_NAME \"zlib\" CACHE STRING \"Defined by kiln\")"));
    }
}
