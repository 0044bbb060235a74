//! Record validation against a template
//!
//! Validation runs in stages and stops at the first stage that fails:
//!
//! 1. template resolution
//! 2. field pass: one check per field, picked from a static table by
//!    [`FieldKind`], plus the latitude/longitude pairing rule
//! 3. mandatory-mark pass
//! 4. coordinate consistency pass
//!
//! Stage 2 collects every field error before returning. A pairing error on
//! its own does not stop the mandatory pass; both are reported together.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ValidationFailure, Violation, ViolationKind};
use crate::registry::TemplateRegistry;
use crate::schema::{FieldDefinition, FieldKind, FieldValue, Template};

/// Normalized field values of a record, keyed by field key
pub type RecordValues = BTreeMap<String, FieldValue>;

pub const LATITUDE_LIMIT: f64 = 90.0;
pub const LONGITUDE_LIMIT: f64 = 180.0;

/// Validator behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Report keys the template does not define instead of dropping them
    pub reject_unknown_fields: bool,
    /// Accept numeric and boolean values written as strings
    pub coerce_strings: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            reject_unknown_fields: false,
            coerce_strings: true,
        }
    }
}

/// A record that passed validation, with the template it was checked against
#[derive(Debug, Clone)]
pub struct ValidatedRecord<'t> {
    pub template: &'t Template,
    pub values: RecordValues,
}

type FieldCheck = fn(&FieldDefinition, &Value, &ValidatorOptions) -> Result<FieldValue, ViolationKind>;

/// The check for each field kind
fn check_for(kind: FieldKind) -> FieldCheck {
    match kind {
        FieldKind::String => check_string,
        FieldKind::Number => check_number,
        FieldKind::Date => check_date,
        FieldKind::Boolean => check_boolean,
        FieldKind::Latitude => check_latitude,
        FieldKind::Longitude => check_longitude,
        FieldKind::ControlledVocabulary => check_vocabulary,
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").expect("static date pattern")
    })
}

fn decimal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("static decimal pattern"))
}

fn check_string(field: &FieldDefinition, value: &Value, _: &ValidatorOptions) -> Result<FieldValue, ViolationKind> {
    let text = value
        .as_str()
        .ok_or(ViolationKind::TypeMismatch { expected: "string" })?;
    if let Some(pattern) = &field.pattern {
        if !pattern.is_full_match(text) {
            return Err(ViolationKind::PatternMismatch {
                pattern: pattern.source().to_string(),
            });
        }
    }
    Ok(FieldValue::Text(text.to_string()))
}

fn check_number(_: &FieldDefinition, value: &Value, options: &ValidatorOptions) -> Result<FieldValue, ViolationKind> {
    let mismatch = ViolationKind::TypeMismatch { expected: "finite number" };
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if options.coerce_strings => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or(mismatch.clone())?;

    if !number.is_finite() {
        return Err(mismatch);
    }
    Ok(FieldValue::Number(number))
}

fn check_boolean(_: &FieldDefinition, value: &Value, options: &ValidatorOptions) -> Result<FieldValue, ViolationKind> {
    match value {
        Value::Bool(b) => Ok(FieldValue::Bool(*b)),
        Value::String(s) if options.coerce_strings && s == "true" => Ok(FieldValue::Bool(true)),
        Value::String(s) if options.coerce_strings && s == "false" => Ok(FieldValue::Bool(false)),
        _ => Err(ViolationKind::TypeMismatch { expected: "boolean" }),
    }
}

fn check_date(_: &FieldDefinition, value: &Value, _: &ValidatorOptions) -> Result<FieldValue, ViolationKind> {
    match value.as_str() {
        Some(text) if date_pattern().is_match(text) => Ok(FieldValue::Text(text.to_string())),
        _ => Err(ViolationKind::TypeMismatch { expected: "date (YYYY-MM-DD)" }),
    }
}

fn check_vocabulary(field: &FieldDefinition, value: &Value, _: &ValidatorOptions) -> Result<FieldValue, ViolationKind> {
    match value.as_str() {
        Some(text) if field.options.iter().any(|o| o == text) => Ok(FieldValue::Text(text.to_string())),
        _ => Err(ViolationKind::NotInVocabulary {
            options: field.options.clone(),
        }),
    }
}

fn check_latitude(_: &FieldDefinition, value: &Value, options: &ValidatorOptions) -> Result<FieldValue, ViolationKind> {
    coordinate(value, LATITUDE_LIMIT, options).map(FieldValue::Number)
}

fn check_longitude(_: &FieldDefinition, value: &Value, options: &ValidatorOptions) -> Result<FieldValue, ViolationKind> {
    coordinate(value, LONGITUDE_LIMIT, options).map(FieldValue::Number)
}

/// Parse a coordinate and check it against `limit`.
///
/// JSON numbers are always finite. Strings must be plain decimals, which keeps
/// out "NaN", "Infinity" and exponent forms that `f64::from_str` would accept.
fn coordinate(value: &Value, limit: f64, options: &ValidatorOptions) -> Result<f64, ViolationKind> {
    let mismatch = ViolationKind::TypeMismatch { expected: "decimal number" };
    let number = match value {
        Value::Number(n) => n.as_f64().ok_or(mismatch)?,
        Value::String(s) if options.coerce_strings && decimal_pattern().is_match(s) => {
            s.parse::<f64>().map_err(|_| mismatch)?
        }
        _ => return Err(mismatch),
    };
    check_bounds(number, limit)?;
    Ok(number)
}

fn check_bounds(number: f64, limit: f64) -> Result<(), ViolationKind> {
    if !number.is_finite() {
        return Err(ViolationKind::TypeMismatch { expected: "decimal number" });
    }
    if number.abs() > limit {
        return Err(ViolationKind::OutOfBounds { limit });
    }
    Ok(())
}

fn is_supplied(record: &Map<String, Value>, key: &str) -> bool {
    !matches!(record.get(key), None | Some(Value::Null))
}

/// Stateless record validator
#[derive(Debug, Clone, Default)]
pub struct Validator {
    options: ValidatorOptions,
}

impl Validator {
    pub fn new(options: ValidatorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    /// Resolve `template_id` in `registry` and validate `record` against it
    pub fn validate<'r>(
        &self,
        registry: &'r TemplateRegistry,
        template_id: &str,
        record: &Map<String, Value>,
    ) -> Result<ValidatedRecord<'r>, ValidationFailure> {
        let template = registry
            .get(template_id)
            .ok_or_else(|| ValidationFailure::new(vec![Violation::unknown_template()]))?;
        self.validate_against(template, record)
    }

    /// Validate `record` against an already resolved template
    pub fn validate_against<'t>(
        &self,
        template: &'t Template,
        record: &Map<String, Value>,
    ) -> Result<ValidatedRecord<'t>, ValidationFailure> {
        let (values, field_violations, pair_violation) = self.field_pass(template, record);
        if !field_violations.is_empty() {
            let mut violations = field_violations;
            violations.extend(pair_violation);
            return Err(ValidationFailure::new(violations));
        }

        let mut violations = mandatory_pass(template, &values);
        violations.extend(pair_violation);
        if !violations.is_empty() {
            return Err(ValidationFailure::new(violations));
        }

        let violations = coordinate_pass(template, &values);
        if !violations.is_empty() {
            return Err(ValidationFailure::new(violations));
        }

        Ok(ValidatedRecord { template, values })
    }

    fn field_pass(
        &self,
        template: &Template,
        record: &Map<String, Value>,
    ) -> (RecordValues, Vec<Violation>, Option<Violation>) {
        let mut values = RecordValues::new();
        let mut violations = Vec::new();

        for field in &template.fields {
            match record.get(&field.key) {
                None | Some(Value::Null) => {
                    if field.required {
                        violations.push(Violation::field(&field.key, ViolationKind::MissingRequired));
                    }
                }
                Some(value) => match check_for(field.kind)(field, value, &self.options) {
                    Ok(normalized) => {
                        values.insert(field.key.clone(), normalized);
                    }
                    Err(kind) => violations.push(Violation::field(&field.key, kind)),
                },
            }
        }

        for key in record.keys().filter(|k| template.field(k).is_none()) {
            if self.options.reject_unknown_fields {
                violations.push(Violation::field(key, ViolationKind::UnknownField));
            } else {
                debug!(template = %template.id, key = %key, "dropping unknown key");
            }
        }

        let pair_violation = template.coordinate_fields().and_then(|(lat, lon)| {
            (is_supplied(record, &lat.key) != is_supplied(record, &lon.key))
                .then(|| Violation::field(&lat.key, ViolationKind::CoordinatePairIncomplete))
        });

        (values, violations, pair_violation)
    }
}

fn mandatory_pass(template: &Template, values: &RecordValues) -> Vec<Violation> {
    template
        .mandatory_fields()
        .filter(|field| values.get(&field.key).map(FieldValue::is_blank).unwrap_or(true))
        .map(|field| Violation::field(&field.key, ViolationKind::MissingMandatory))
        .collect()
}

fn coordinate_pass(template: &Template, values: &RecordValues) -> Vec<Violation> {
    let Some((lat_field, lon_field)) = template.coordinate_fields() else {
        return Vec::new();
    };
    let (Some(lat), Some(lon)) = (
        values.get(&lat_field.key).and_then(FieldValue::as_f64),
        values.get(&lon_field.key).and_then(FieldValue::as_f64),
    ) else {
        return Vec::new();
    };

    let mut violations = Vec::new();
    if let Err(kind) = check_bounds(lat, LATITUDE_LIMIT) {
        violations.push(Violation::field(&lat_field.key, kind));
    }
    if let Err(kind) = check_bounds(lon, LONGITUDE_LIMIT) {
        violations.push(Violation::field(&lon_field.key, kind));
    }
    if lat == 0.0 && lon == 0.0 {
        violations.push(Violation::field(&lat_field.key, ViolationKind::ZeroZeroCoordinate));
    }
    violations
}
