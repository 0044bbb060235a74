//! Built-in templates
//!
//! The GIF recommended datasets shipped with the service. Definitions live in
//! `templates/*.json` and are compiled into the binary.

use std::path::Path;

use include_dir::{include_dir, Dir};

use crate::error::{RegistryError, Result};
use crate::schema::TemplateDefinition;

static BUILTIN_TEMPLATES: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// Parse every embedded definition, in file-name order
pub fn builtin_definitions() -> Result<Vec<TemplateDefinition>> {
    let mut files: Vec<(&Path, &str)> = BUILTIN_TEMPLATES
        .files()
        .filter(|f| f.path().extension().map(|e| e == "json").unwrap_or(false))
        .filter_map(|f| f.contents_utf8().map(|content| (f.path(), content)))
        .collect();
    files.sort_by(|a, b| a.0.cmp(b.0));

    files
        .into_iter()
        .map(|(_, content)| serde_json::from_str(content).map_err(RegistryError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_parse_and_check() {
        let defs = builtin_definitions().unwrap();
        assert_eq!(defs.len(), 5);
        for def in &defs {
            def.check().unwrap();
        }
    }

    #[test]
    fn test_builtin_required_fields_are_mandatory() {
        for def in builtin_definitions().unwrap() {
            for field in &def.fields {
                if field.required {
                    assert!(field.mandatory, "{}.{} is required but not mandatory", def.id, field.key);
                }
                if field.kind.is_coordinate() {
                    assert!(!field.required && field.mandatory, "{}.{}", def.id, field.key);
                }
            }
        }
    }
}
