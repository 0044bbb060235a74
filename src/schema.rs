//! Template and field definition types

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::checksum::Checksum;
use crate::error::{RegistryError, Result};

/// Type of a template field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    String,
    Number,
    Date,
    Boolean,
    Latitude,
    Longitude,
    ControlledVocabulary,
}

impl FieldKind {
    /// Name used on the wire and in messages
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
            FieldKind::Boolean => "boolean",
            FieldKind::Latitude => "latitude",
            FieldKind::Longitude => "longitude",
            FieldKind::ControlledVocabulary => "controlled-vocabulary",
        }
    }

    pub fn is_coordinate(&self) -> bool {
        matches!(self, FieldKind::Latitude | FieldKind::Longitude)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field pattern with full-match semantics.
///
/// Serializes as the pattern source; the compiled form is anchored on both ends.
#[derive(Debug, Clone)]
pub struct FieldPattern {
    source: String,
    regex: Regex,
}

impl FieldPattern {
    pub fn new(source: impl Into<String>) -> std::result::Result<Self, regex::Error> {
        let source = source.into();
        let regex = Regex::new(&format!("^(?:{})$", source))?;
        Ok(Self { source, regex })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_full_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for FieldPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for FieldPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for FieldPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        FieldPattern::new(source).map_err(serde::de::Error::custom)
    }
}

/// A single field of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Record key, unique within the template
    pub key: String,
    /// Display label (defaults to the key)
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// The field may not be omitted from a submission
    #[serde(default)]
    pub required: bool,
    /// The field must be present and non-empty on every stored record
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<FieldPattern>,
    /// Allowed values (controlled-vocabulary only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FieldDefinition {
    /// Create an optional, unmarked field
    pub fn new(key: impl Into<String>, kind: FieldKind) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            kind,
            required: false,
            mandatory: false,
            pattern: None,
            options: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn with_pattern(mut self, pattern: FieldPattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// A template as submitted for registration
/// Keys the service writes next to field values in records and entities
pub const RESERVED_FIELD_KEYS: &[&str] = &["id", "type", "location", "@context"];

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("static id pattern"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FieldDefinition>,
}

impl TemplateDefinition {
    pub fn new(id: impl Into<String>, label: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: String::new(),
            fields,
        }
    }

    /// Check that the definition is well formed
    pub fn check(&self) -> Result<()> {
        if !id_pattern().is_match(&self.id) {
            return Err(RegistryError::invalid_template(&self.id, "id must be kebab-case"));
        }
        if self.fields.is_empty() {
            return Err(RegistryError::invalid_template(&self.id, "template has no fields"));
        }

        let mut seen = HashSet::new();
        let mut latitudes = 0;
        let mut longitudes = 0;
        for field in &self.fields {
            if field.key.trim().is_empty() {
                return Err(RegistryError::invalid_template(&self.id, "field key is empty"));
            }
            if RESERVED_FIELD_KEYS.contains(&field.key.as_str()) {
                return Err(RegistryError::invalid_template(
                    &self.id,
                    format!("field key '{}' is reserved", field.key),
                ));
            }
            if !seen.insert(field.key.as_str()) {
                return Err(RegistryError::invalid_template(
                    &self.id,
                    format!("duplicate field key '{}'", field.key),
                ));
            }
            match field.kind {
                FieldKind::ControlledVocabulary if field.options.is_empty() => {
                    return Err(RegistryError::invalid_template(
                        &self.id,
                        format!("vocabulary field '{}' has no options", field.key),
                    ));
                }
                FieldKind::Latitude => latitudes += 1,
                FieldKind::Longitude => longitudes += 1,
                _ => {}
            }
        }

        if latitudes > 1 || longitudes > 1 {
            return Err(RegistryError::invalid_template(
                &self.id,
                "at most one latitude and one longitude field",
            ));
        }
        if latitudes != longitudes {
            return Err(RegistryError::invalid_template(
                &self.id,
                "latitude and longitude fields must be defined together",
            ));
        }
        Ok(())
    }
}

/// A registered template. Never mutated after registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub label: String,
    pub description: String,
    pub fields: Vec<FieldDefinition>,
    pub checksum: Checksum,
    pub registered_at: DateTime<Utc>,
}

impl Template {
    /// Check a definition and freeze it into a template
    pub fn from_definition(mut definition: TemplateDefinition) -> Result<Self> {
        definition.check()?;
        for field in &mut definition.fields {
            if field.label.trim().is_empty() {
                field.label = field.key.clone();
            }
        }
        let checksum = Checksum::from_serializable(&definition)?;
        let TemplateDefinition {
            id,
            label,
            description,
            fields,
        } = definition;

        Ok(Self {
            id,
            label,
            description,
            fields,
            checksum,
            registered_at: Utc::now(),
        })
    }

    /// Get a field by key
    pub fn field(&self, key: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn field_of_kind(&self, kind: FieldKind) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.kind == kind)
    }

    /// The latitude/longitude field pair, if the template is geolocated
    pub fn coordinate_fields(&self) -> Option<(&FieldDefinition, &FieldDefinition)> {
        Some((
            self.field_of_kind(FieldKind::Latitude)?,
            self.field_of_kind(FieldKind::Longitude)?,
        ))
    }

    pub fn mandatory_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.mandatory)
    }
}

/// A validated field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Empty after trimming (text values only)
    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.trim().is_empty())
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}
