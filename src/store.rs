//! In-memory model and record store
//!
//! A model is an instance of a template that collects records. Nothing here
//! outlives the process.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use ulid::Ulid;

use crate::error::{RegistryError, Result};
use crate::schema::{FieldValue, Template};
use crate::validator::{RecordValues, ValidatedRecord};

/// A template instance that collects records
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: String,
    pub template_id: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// A stored, validated record
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub values: RecordValues,
}

impl Record {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }
}

/// Models in creation order and the records of each
#[derive(Debug, Default)]
pub struct RecordStore {
    models: Vec<Model>,
    records: HashMap<String, Vec<Record>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a model for `template`; the label defaults to the template label
    pub fn create_model(&mut self, template: &Template, label: Option<String>) -> &Model {
        let model = Model {
            id: Ulid::new().to_string(),
            template_id: template.id.clone(),
            label: label
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| template.label.clone()),
            created_at: Utc::now(),
        };
        info!(model = %model.id, template = %model.template_id, "created model");

        self.records.insert(model.id.clone(), Vec::new());
        self.models.push(model);
        &self.models[self.models.len() - 1]
    }

    pub fn list_models(&self) -> &[Model] {
        &self.models
    }

    pub fn get_model(&self, id: &str) -> Result<&Model> {
        self.models
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| RegistryError::UnknownModel(id.to_string()))
    }

    /// Store a validated record under `model_id`.
    ///
    /// The record must have been validated against the model's template.
    pub fn insert_record(&mut self, model_id: &str, validated: ValidatedRecord<'_>) -> Result<&Record> {
        let model = self.get_model(model_id)?;
        if model.template_id != validated.template.id {
            return Err(RegistryError::TemplateMismatch {
                model: model.id.clone(),
                expected: model.template_id.clone(),
                actual: validated.template.id.clone(),
            });
        }

        let records = self
            .records
            .get_mut(model_id)
            .ok_or_else(|| RegistryError::UnknownModel(model_id.to_string()))?;
        let record = Record {
            id: Ulid::new().to_string(),
            values: validated.values,
        };
        debug!(model = %model_id, record = %record.id, "stored record");

        records.push(record);
        Ok(&records[records.len() - 1])
    }

    pub fn list_records(&self, model_id: &str) -> Result<&[Record]> {
        self.records
            .get(model_id)
            .map(Vec::as_slice)
            .ok_or_else(|| RegistryError::UnknownModel(model_id.to_string()))
    }

    pub fn get_record(&self, model_id: &str, record_id: &str) -> Result<&Record> {
        self.list_records(model_id)?
            .iter()
            .find(|r| r.id == record_id)
            .ok_or_else(|| RegistryError::UnknownRecord {
                model: model_id.to_string(),
                record: record_id.to_string(),
            })
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}
