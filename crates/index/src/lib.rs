#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Recipe lookup for kiln
//!
//! The resolver never talks to a registry directly; it asks a
//! [`RecipeSource`] for the highest recipe version matching a constraint.
//! [`RecipeIndex`] is the in-memory implementation, optionally filled from a
//! directory of YAML recipes.

use kiln_config::constants::RECIPE_EXTENSIONS;
use kiln_errors::{Error, RecipeError};
use kiln_recipe::Recipe;
use kiln_types::{Version, VersionSpec};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recipe lookup used by the resolver
pub trait RecipeSource: Send + Sync {
    /// Highest version of `name` satisfying `spec`
    fn resolve(&self, name: &str, spec: &VersionSpec) -> Option<Arc<Recipe>>;

    /// Every known version of `name`, ascending
    fn versions(&self, name: &str) -> Vec<Version>;

    /// Whether any version of `name` is known
    fn contains(&self, name: &str) -> bool {
        !self.versions(name).is_empty()
    }
}

impl<T: RecipeSource + ?Sized> RecipeSource for Arc<T> {
    fn resolve(&self, name: &str, spec: &VersionSpec) -> Option<Arc<Recipe>> {
        (**self).resolve(name, spec)
    }

    fn versions(&self, name: &str) -> Vec<Version> {
        (**self).versions(name)
    }
}

/// In-memory recipe registry keyed by name, then version
#[derive(Debug, Clone, Default)]
pub struct RecipeIndex {
    packages: BTreeMap<String, BTreeMap<Version, Arc<Recipe>>>,
}

impl RecipeIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipe, returning the one it replaced
    pub fn add(&mut self, recipe: Recipe) -> Option<Arc<Recipe>> {
        self.packages
            .entry(recipe.name.clone())
            .or_default()
            .insert(recipe.version.clone(), Arc::new(recipe))
    }

    /// Builder-style [`add`](Self::add)
    #[must_use]
    pub fn with(mut self, recipe: Recipe) -> Self {
        self.add(recipe);
        self
    }

    /// Exact lookup
    #[must_use]
    pub fn get(&self, name: &str, version: &Version) -> Option<Arc<Recipe>> {
        self.packages.get(name)?.get(version).cloned()
    }

    /// Number of recipe versions held
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Search for packages by name (prefix match, case-insensitive)
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query_lower = query.to_lowercase();
        self.packages
            .keys()
            .filter(|name| name.to_lowercase().starts_with(&query_lower))
            .map(String::as_str)
            .collect()
    }

    /// Load every `*.yml`/`*.yaml` recipe below `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read, a recipe fails to
    /// load, or two files define the same `name/version`.
    pub async fn load_dir(dir: &Path) -> Result<Self, Error> {
        let mut index = Self::new();
        let mut files = recipe_files(dir).await?;
        files.sort();

        for path in files {
            let recipe = kiln_recipe::load_file(&path).await?;
            let id = recipe.id();
            if index.add(recipe).is_some() {
                return Err(RecipeError::malformed(
                    id.to_string(),
                    format!("defined more than once in {}", dir.display()),
                )
                .into());
            }
        }

        tracing::debug!(dir = %dir.display(), recipes = index.len(), "loaded recipe registry");
        Ok(index)
    }
}

impl RecipeSource for RecipeIndex {
    fn resolve(&self, name: &str, spec: &VersionSpec) -> Option<Arc<Recipe>> {
        let versions = self.packages.get(name)?;
        let best = spec.best_match(versions.keys())?;
        versions.get(best).cloned()
    }

    fn versions(&self, name: &str) -> Vec<Version> {
        self.packages
            .get(name)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()
    }
}

async fn recipe_files(root: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| Error::io_with_path(&e, &dir))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io_with_path(&e, &dir))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Error::io_with_path(&e, &path))?;

            if file_type.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| RECIPE_EXTENSIONS.contains(&ext))
            {
                files.push(path);
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(name: &str, version: &str) -> Recipe {
        Recipe::new(name, version.parse().unwrap())
    }

    #[test]
    fn test_resolve_highest_match() {
        let index = RecipeIndex::new()
            .with(recipe("b", "1.0.0"))
            .with(recipe("b", "1.4.2"))
            .with(recipe("b", "2.0.0"));

        let spec: VersionSpec = "^1.0".parse().unwrap();
        let found = index.resolve("b", &spec).unwrap();
        assert_eq!(found.version.to_string(), "1.4.2");

        let none: VersionSpec = ">=3.0".parse().unwrap();
        assert!(index.resolve("b", &none).is_none());
        assert!(index.resolve("missing", &VersionSpec::any()).is_none());
    }

    #[test]
    fn test_versions_and_contains() {
        let index = RecipeIndex::new()
            .with(recipe("d", "2.1.0"))
            .with(recipe("d", "2.0.0"));
        let versions: Vec<String> = index.versions("d").iter().map(ToString::to_string).collect();
        assert_eq!(versions, vec!["2.0.0", "2.1.0"]);
        assert!(index.contains("d"));
        assert!(!index.contains("e"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_search() {
        let index = RecipeIndex::new()
            .with(recipe("curl", "8.5.0"))
            .with(recipe("curlie", "1.0.0"))
            .with(recipe("wget", "1.21.0"));

        assert_eq!(index.search("cur"), vec!["curl", "curlie"]);
        assert_eq!(index.search("CURL"), vec!["curl", "curlie"]);
    }
}
