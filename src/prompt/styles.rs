//! Style directives
//!
//! A style directive is guidance text prepended to a rendered prompt to bias
//! tone without touching the template. Built-in styles ship with the crate;
//! custom ones live in a JSON file next to the configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::LorewrightError;

/// Name of the empty style; the model keeps its own voice
pub const DEFAULT_STYLE: &str = "default";

const BUILTIN: &[(&str, &str)] = &[
    (DEFAULT_STYLE, ""),
    (
        "detailed",
        "You are a creative writing assistant focused on rich, detailed description. \
         Use vivid sensory detail, specific measurements and concrete examples. \
         Avoid vague language.",
    ),
    (
        "concise",
        "You are a creative writing assistant focused on concise, punchy prose. \
         Use short sentences. Cut every word that does not earn its place.",
    ),
    (
        "creative",
        "You are a highly inventive writing assistant. Favour unexpected connections \
         and original ideas over familiar tropes, and subvert expectations where it \
         serves the story.",
    ),
    (
        "mature",
        "You are a fiction writing assistant for adult readers. Handle violence, grief, \
         moral ambiguity and intimacy with emotional honesty and literary restraint. \
         Characters act with agency and consent.",
    ),
];

/// Built-in and user-defined style directives
#[derive(Debug, Clone, Default)]
pub struct StyleCatalogue {
    custom: BTreeMap<String, String>,
    path: Option<PathBuf>,
}

impl StyleCatalogue {
    /// Catalogue with the built-in styles only and no backing file
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Load custom styles from `path`; a missing file means no custom styles
    ///
    /// Later edits are written back to the same file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LorewrightError> {
        let path = path.as_ref();
        let custom = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let custom: BTreeMap<String, String> = serde_json::from_str(&content).map_err(|e| {
                LorewrightError::ConfigError(format!(
                    "Failed to parse styles file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            debug!(count = custom.len(), path = %path.display(), "Loaded custom styles");
            custom
                .into_iter()
                .map(|(name, text)| (normalize(&name), text))
                .filter(|(name, _)| !is_builtin(name))
                .collect()
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            custom,
            path: Some(path.to_path_buf()),
        })
    }

    /// Directive text for a known style name
    pub fn get(&self, name: &str) -> Option<&str> {
        let key = normalize(name);
        if let Some(&(_, text)) = BUILTIN.iter().find(|(n, _)| *n == key) {
            return Some(text);
        }
        self.custom.get(&key).map(String::as_str)
    }

    /// Directive text to prepend for a style name
    ///
    /// An empty or unknown name contributes nothing; unknown names are logged.
    pub fn resolve(&self, name: &str) -> &str {
        if name.trim().is_empty() {
            return "";
        }
        self.get(name).unwrap_or_else(|| {
            warn!(style = %name, "Unknown style directive, using the default voice");
            ""
        })
    }

    /// Built-in names first, then custom names in sorted order
    pub fn names(&self) -> Vec<&str> {
        BUILTIN
            .iter()
            .map(|(n, _)| *n)
            .chain(self.custom.keys().map(String::as_str))
            .collect()
    }

    pub fn is_custom(&self, name: &str) -> bool {
        self.custom.contains_key(&normalize(name))
    }

    /// Add or replace a custom style and persist the catalogue
    pub fn save_custom(&mut self, name: &str, text: &str) -> Result<(), LorewrightError> {
        let key = normalize(name);
        if key.is_empty() {
            return Err(LorewrightError::ConfigError(
                "Style name cannot be empty".to_string(),
            ));
        }
        if is_builtin(&key) {
            return Err(LorewrightError::ConfigError(format!(
                "'{}' is a built-in style and cannot be modified",
                key
            )));
        }

        self.custom.insert(key.clone(), text.trim().to_string());
        self.persist()?;
        info!(style = %key, "Saved custom style");
        Ok(())
    }

    /// Remove a custom style; returns whether it existed
    pub fn delete_custom(&mut self, name: &str) -> Result<bool, LorewrightError> {
        let key = normalize(name);
        if is_builtin(&key) {
            return Err(LorewrightError::ConfigError(format!(
                "'{}' is a built-in style and cannot be deleted",
                key
            )));
        }

        if self.custom.remove(&key).is_none() {
            return Ok(false);
        }
        self.persist()?;
        info!(style = %key, "Deleted custom style");
        Ok(true)
    }

    fn persist(&self) -> Result<(), LorewrightError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.custom).map_err(|e| {
            LorewrightError::ConfigError(format!("Failed to serialize styles: {}", e))
        })?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

pub fn is_builtin(name: &str) -> bool {
    let key = normalize(name);
    BUILTIN.iter().any(|(n, _)| *n == key)
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_resolution() {
        let styles = StyleCatalogue::builtin();
        assert_eq!(styles.resolve(""), "");
        assert_eq!(styles.resolve("Default"), "");
        assert!(styles.resolve("concise").contains("short sentences"));
        assert_eq!(styles.resolve("baroque"), "");
        assert_eq!(styles.get("baroque"), None);
        assert_eq!(styles.get(" Concise "), styles.get("concise"));
    }

    #[test]
    fn test_custom_styles_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("styles.json");

        let mut styles = StyleCatalogue::load(&path).unwrap();
        styles.save_custom("Noir", "Write like a hardboiled detective.").unwrap();
        assert!(styles.is_custom("noir"));

        let reloaded = StyleCatalogue::load(&path).unwrap();
        assert_eq!(
            reloaded.resolve("noir"),
            "Write like a hardboiled detective."
        );
        assert_eq!(reloaded.names().last(), Some(&"noir"));
    }

    #[test]
    fn test_builtins_are_protected() {
        let mut styles = StyleCatalogue::builtin();
        assert!(styles.save_custom("concise", "override").is_err());
        assert!(styles.delete_custom("detailed").is_err());
        assert!(!styles.is_custom("concise"));
        assert!(!styles.delete_custom("never-added").unwrap());
    }
}
