//! Template Registry
//!
//! Append-only catalog of templates, kept in registration order.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::builtin::builtin_definitions;
use crate::error::{RegistryError, Result};
use crate::schema::{Template, TemplateDefinition};

/// The template registry
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    /// Templates in registration order
    templates: Vec<Template>,
    /// Template id -> position in `templates`
    index: HashMap<String, usize>,
}

impl TemplateRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in templates
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        for definition in builtin_definitions()? {
            registry.add(definition)?;
        }
        Ok(registry)
    }

    /// All templates, in registration order
    pub fn list(&self) -> &[Template] {
        &self.templates
    }

    /// Get a template by id
    pub fn get(&self, id: &str) -> Option<&Template> {
        self.index.get(id).map(|&i| &self.templates[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Register a new template
    ///
    /// This is an append-only operation - existing templates cannot be replaced.
    /// The registry is left unchanged on any error.
    pub fn add(&mut self, definition: TemplateDefinition) -> Result<&Template> {
        if self.index.contains_key(&definition.id) {
            return Err(RegistryError::DuplicateTemplateId(definition.id));
        }
        let template = Template::from_definition(definition)?;

        info!(
            template = %template.id,
            fields = template.fields.len(),
            checksum = %template.checksum.short(),
            "registered template"
        );

        let position = self.templates.len();
        self.index.insert(template.id.clone(), position);
        self.templates.push(template);
        Ok(&self.templates[position])
    }

    /// Register every `*.json` definition in `dir`, in file-name order.
    ///
    /// Stops at the first file that fails to parse or register; templates
    /// from earlier files stay registered.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let mut paths: Vec<_> = fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();
        paths.sort();

        for path in &paths {
            debug!(path = %path.display(), "loading template definition");
            let content = fs::read_to_string(path)?;
            let definition: TemplateDefinition = serde_json::from_str(&content)?;
            self.add(definition)?;
        }
        Ok(paths.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefinition, FieldKind};
    use tempfile::tempdir;

    fn definition(id: &str) -> TemplateDefinition {
        TemplateDefinition::new(
            id,
            "Test",
            vec![FieldDefinition::new("name", FieldKind::String).required().mandatory()],
        )
    }

    #[test]
    fn test_create_registry() {
        let registry = TemplateRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("public-facilities").is_none());
    }

    #[test]
    fn test_builtins_loaded_in_order() {
        let registry = TemplateRegistry::with_builtins().unwrap();
        let ids: Vec<_> = registry.list().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "aed-locations",
                "evacuation-shelters",
                "local-events",
                "public-facilities",
                "tourism-spots"
            ]
        );
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut registry = TemplateRegistry::new();
        registry.add(definition("zeta")).unwrap();
        registry.add(definition("alpha")).unwrap();
        let ids: Vec<_> = registry.list().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_duplicate_id_leaves_registry_unchanged() {
        let mut registry = TemplateRegistry::new();
        let first = registry.add(definition("parks")).unwrap().checksum.clone();

        let mut replacement = definition("parks");
        replacement.label = "Replacement".to_string();
        let result = registry.add(replacement);
        assert!(matches!(result, Err(RegistryError::DuplicateTemplateId(id)) if id == "parks"));

        assert_eq!(registry.len(), 1);
        let kept = registry.get("parks").unwrap();
        assert_eq!(kept.label, "Test");
        assert_eq!(kept.checksum, first);
    }

    #[test]
    fn test_invalid_definition_not_registered() {
        let mut registry = TemplateRegistry::new();
        assert!(registry.add(definition("Not Kebab")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_dir() {
        let dir = tempdir().unwrap();
        let content = serde_json::to_string(&definition("bus-stops")).unwrap();
        fs::write(dir.path().join("bus-stops.json"), content).unwrap();
        fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let mut registry = TemplateRegistry::new();
        assert_eq!(registry.load_dir(dir.path()).unwrap(), 1);
        assert!(registry.contains("bus-stops"));
    }
}
