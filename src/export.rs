//! Catalog and context-broker translations
//!
//! Builds the request bodies a publisher would send to CKAN (`package_create`)
//! and to an NGSI-LD broker (`POST /ngsi-ld/v1/entities`). Nothing here talks
//! to the network.

use serde_json::{json, Map, Value};

use crate::config::ExportConfig;
use crate::schema::{FieldKind, Template};
use crate::store::{Model, Record};

/// NGSI-LD entity type for a template: `public-facilities` -> `PublicFacilities`
pub fn entity_type(template_id: &str) -> String {
    template_id
        .split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// CKAN package name for a model; CKAN only accepts lower-case names
pub fn package_name(model: &Model) -> String {
    format!("{}-{}", model.template_id, model.id.to_ascii_lowercase())
}

/// CKAN `package_create` body describing a model
pub fn ckan_package(template: &Template, model: &Model, record_count: usize, config: &ExportConfig) -> Value {
    json!({
        "name": package_name(model),
        "title": model.label,
        "notes": template.description,
        "owner_org": config.ckan_owner_org,
        "license_id": config.ckan_license_id,
        "tags": [{ "name": template.id }],
        "extras": [
            { "key": "template_id", "value": template.id },
            { "key": "template_checksum", "value": template.checksum.as_str() },
            { "key": "record_count", "value": record_count.to_string() },
            { "key": "created_at", "value": model.created_at.to_rfc3339() },
        ],
    })
}

/// NGSI-LD entity for a stored record.
///
/// Coordinates fold into a `location` GeoProperty; dates become typed values.
pub fn ngsi_ld_entity(template: &Template, record: &Record, config: &ExportConfig) -> Value {
    let kind = entity_type(&template.id);
    let mut entity = Map::new();
    entity.insert("id".into(), json!(format!("urn:ngsi-ld:{}:{}", kind, record.id)));
    entity.insert("type".into(), json!(kind));

    for field in template.fields.iter().filter(|f| !f.kind.is_coordinate()) {
        let Some(value) = record.get(&field.key) else {
            continue;
        };
        let value = match field.kind {
            FieldKind::Date => json!({ "@type": "Date", "@value": value.to_json() }),
            _ => value.to_json(),
        };
        entity.insert(field.key.clone(), json!({ "type": "Property", "value": value }));
    }

    if let Some((lat, lon)) = template.coordinate_fields() {
        let lat = record.get(&lat.key).and_then(|v| v.as_f64());
        let lon = record.get(&lon.key).and_then(|v| v.as_f64());
        if let (Some(lat), Some(lon)) = (lat, lon) {
            entity.insert(
                "location".into(),
                json!({
                    "type": "GeoProperty",
                    "value": { "type": "Point", "coordinates": [lon, lat] },
                }),
            );
        }
    }

    entity.insert("@context".into(), json!([config.ngsi_ld_context]));
    Value::Object(entity)
}
