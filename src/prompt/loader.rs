//! Prompt Loader - Load and cache prompt overrides from a directory
//!
//! Templates are `<name>.md` files. Loaded content is cached in memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{AgentError, Result};

/// Loads and caches prompt templates from a directory
pub struct PromptLoader {
    templates_dir: PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

impl PromptLoader {
    pub fn new(templates_dir: impl AsRef<Path>) -> Self {
        Self {
            templates_dir: templates_dir.as_ref().to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    /// Load a template (name without `.md`), from cache when possible
    pub fn load(&self, name: &str) -> Result<String> {
        if let Some(content) = self.cache.read().get(name) {
            return Ok(content.clone());
        }

        let path = self.template_path(name);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            AgentError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to load template '{}' from {:?}: {}", name, path, e),
            ))
        })?;

        self.cache.write().insert(name.to_string(), content.clone());
        Ok(content)
    }

    /// True if `<name>.md` exists in the directory
    pub fn exists(&self, name: &str) -> bool {
        self.template_path(name).exists()
    }

    fn template_path(&self, name: &str) -> PathBuf {
        self.templates_dir.join(format!("{}.md", name))
    }

    /// Names of all templates in the directory, sorted
    pub fn list_available(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.templates_dir).map_err(|e| {
            AgentError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read templates directory {:?}: {}", self.templates_dir, e),
            ))
        })?;

        let mut templates = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md")
                && let Some(stem) = path.file_stem()
                && let Some(name) = stem.to_str()
            {
                templates.push(name.to_string());
            }
        }

        templates.sort();
        Ok(templates)
    }

    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PromptLoader) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("shopping.md"), "Buy {{item}}").unwrap();
        fs::write(dir.path().join("global.md"), "Rules").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let loader = PromptLoader::new(dir.path());
        (dir, loader)
    }

    #[test]
    fn test_load_template() {
        let (_dir, loader) = setup();
        assert_eq!(loader.load("shopping").unwrap(), "Buy {{item}}");
    }

    #[test]
    fn test_load_uses_cache() {
        let (dir, loader) = setup();
        loader.load("global").unwrap();
        fs::write(dir.path().join("global.md"), "Changed").unwrap();
        assert_eq!(loader.load("global").unwrap(), "Rules");

        loader.clear_cache();
        assert_eq!(loader.load("global").unwrap(), "Changed");
    }

    #[test]
    fn test_load_missing() {
        let (_dir, loader) = setup();
        let err = loader.load("authentication").unwrap_err();
        assert!(matches!(err, AgentError::Io(_)));
        assert!(err.to_string().contains("authentication"));
    }

    #[test]
    fn test_exists_and_list() {
        let (_dir, loader) = setup();
        assert!(loader.exists("shopping"));
        assert!(!loader.exists("notes"));
        assert_eq!(loader.list_available().unwrap(), vec!["global", "shopping"]);
    }
}
