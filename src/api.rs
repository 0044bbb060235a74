//! HTTP surface
//!
//! Thin axum handlers over the template registry, the validator and the record
//! store. Lock order is always registry before store.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::{CmsConfig, ExportConfig};
use crate::error::{RegistryError, Result, ValidationFailure, Violation};
use crate::export::{ckan_package, ngsi_ld_entity};
use crate::registry::TemplateRegistry;
use crate::schema::{Template, TemplateDefinition};
use crate::store::{Model, Record, RecordStore};
use crate::validator::{RecordValues, Validator};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    registry: Arc<RwLock<TemplateRegistry>>,
    store: Arc<RwLock<RecordStore>>,
    validator: Validator,
    export: Arc<ExportConfig>,
}

impl AppState {
    pub fn new(registry: TemplateRegistry, validator: Validator, export: ExportConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            store: Arc::new(RwLock::new(RecordStore::new())),
            validator,
            export: Arc::new(export),
        }
    }

    /// Build the registry described by `config` and wrap it in fresh state
    pub fn from_config(config: &CmsConfig) -> Result<Self> {
        let mut registry = if config.registry.include_builtin {
            TemplateRegistry::with_builtins()?
        } else {
            TemplateRegistry::new()
        };
        if let Some(dir) = &config.registry.templates_dir {
            let loaded = registry.load_dir(dir)?;
            info!(dir = %dir.display(), loaded, "loaded extra templates");
        }
        Ok(Self::new(
            registry,
            Validator::new(config.validator_options()),
            config.export.clone(),
        ))
    }

    fn registry(&self) -> Result<RwLockReadGuard<'_, TemplateRegistry>> {
        self.registry.read().map_err(|_| RegistryError::LockPoisoned("registry"))
    }

    fn registry_mut(&self) -> Result<RwLockWriteGuard<'_, TemplateRegistry>> {
        self.registry.write().map_err(|_| RegistryError::LockPoisoned("registry"))
    }

    fn store(&self) -> Result<RwLockReadGuard<'_, RecordStore>> {
        self.store.read().map_err(|_| RegistryError::LockPoisoned("store"))
    }

    fn store_mut(&self) -> Result<RwLockWriteGuard<'_, RecordStore>> {
        self.store.write().map_err(|_| RegistryError::LockPoisoned("store"))
    }
}

/// Build the service router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/templates", get(list_templates).post(create_template))
        .route("/api/templates/:id", get(get_template))
        .route("/api/validate/:template_id", post(validate_record))
        .route("/api/models", get(list_models).post(create_model))
        .route("/api/models/:id", get(get_model))
        .route("/api/models/:id/items", get(list_items).post(create_item))
        .route("/api/models/:id/items/:item_id", get(get_item))
        .route("/api/models/:id/items/:item_id/entity", get(get_entity))
        .route("/api/models/:id/catalog", get(get_catalog))
        .with_state(state)
}

/// Error body: `{"error": summary, "errors": [messages]}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    errors: Vec<String>,
}

impl ApiError {
    fn bad_request(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status: StatusCode::BAD_REQUEST,
            errors: vec![error.clone()],
            error,
        }
    }

    fn unknown_template() -> Self {
        Self::from(ValidationFailure::new(vec![Violation::unknown_template()]))
            .with_status(StatusCode::NOT_FOUND)
    }

    fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl From<ValidationFailure> for ApiError {
    fn from(failure: ValidationFailure) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: failure.to_string(),
            errors: failure.messages(),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let status = match &err {
            RegistryError::DuplicateTemplateId(_) => StatusCode::CONFLICT,
            RegistryError::UnknownTemplate(_)
            | RegistryError::UnknownModel(_)
            | RegistryError::UnknownRecord { .. } => StatusCode::NOT_FOUND,
            RegistryError::Validation(failure) => return Self::from(failure.clone()),
            RegistryError::InvalidTemplate { .. }
            | RegistryError::TemplateMismatch { .. }
            | RegistryError::Json(_) => StatusCode::BAD_REQUEST,
            RegistryError::LockPoisoned(_) | RegistryError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = err.to_string();
        Self {
            status,
            errors: vec![message.clone()],
            error: message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.error, "errors": self.errors }));
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// `Json` body extractor whose rejections use the API error body
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> ApiResult<Self> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

fn as_record(body: Value) -> ApiResult<Map<String, Value>> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::bad_request("record must be a JSON object")),
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    templates: usize,
    models: usize,
}

async fn healthz(State(state): State<AppState>) -> ApiResult<Json<Health>> {
    let templates = state.registry()?.len();
    let models = state.store()?.model_count();
    Ok(Json(Health {
        status: "ok",
        templates,
        models,
    }))
}

async fn list_templates(State(state): State<AppState>) -> ApiResult<Json<Vec<Template>>> {
    Ok(Json(state.registry()?.list().to_vec()))
}

async fn get_template(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Template>> {
    let registry = state.registry()?;
    let template = registry.get(&id).ok_or(RegistryError::UnknownTemplate(id))?;
    Ok(Json(template.clone()))
}

async fn create_template(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<(StatusCode, Json<Template>)> {
    let definition: TemplateDefinition = serde_json::from_value(body).map_err(RegistryError::from)?;
    let mut registry = state.registry_mut()?;
    let template = registry.add(definition)?.clone();
    Ok((StatusCode::CREATED, Json(template)))
}

#[derive(Serialize)]
struct DryRun {
    valid: bool,
    #[serde(rename = "templateId")]
    template_id: String,
    record: RecordValues,
}

async fn validate_record(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<DryRun>> {
    let record = as_record(body)?;
    let registry = state.registry()?;
    let template = registry.get(&template_id).ok_or_else(ApiError::unknown_template)?;
    let validated = state.validator.validate_against(template, &record)?;
    Ok(Json(DryRun {
        valid: true,
        template_id,
        record: validated.values,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateModel {
    template_id: String,
    #[serde(default)]
    label: Option<String>,
}

async fn create_model(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateModel>,
) -> ApiResult<(StatusCode, Json<Model>)> {
    let registry = state.registry()?;
    let template = registry
        .get(&request.template_id)
        .ok_or(RegistryError::UnknownTemplate(request.template_id.clone()))?;
    let mut store = state.store_mut()?;
    let model = store.create_model(template, request.label).clone();
    Ok((StatusCode::CREATED, Json(model)))
}

async fn list_models(State(state): State<AppState>) -> ApiResult<Json<Vec<Model>>> {
    Ok(Json(state.store()?.list_models().to_vec()))
}

async fn get_model(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Model>> {
    Ok(Json(state.store()?.get_model(&id)?.clone()))
}

async fn create_item(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<(StatusCode, Json<Record>)> {
    let record = as_record(body)?;
    let template_id = state.store()?.get_model(&model_id)?.template_id.clone();

    let registry = state.registry()?;
    let validated = state
        .validator
        .validate(&registry, &template_id, &record)
        .map_err(|failure| {
            warn!(model = %model_id, template = %template_id, errors = failure.violations.len(), "rejected record");
            failure
        })?;

    let mut store = state.store_mut()?;
    let stored = store.insert_record(&model_id, validated)?.clone();
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn list_items(State(state): State<AppState>, Path(model_id): Path<String>) -> ApiResult<Json<Vec<Record>>> {
    Ok(Json(state.store()?.list_records(&model_id)?.to_vec()))
}

async fn get_item(
    State(state): State<AppState>,
    Path((model_id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<Record>> {
    Ok(Json(state.store()?.get_record(&model_id, &item_id)?.clone()))
}

async fn get_entity(
    State(state): State<AppState>,
    Path((model_id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let registry = state.registry()?;
    let store = state.store()?;
    let model = store.get_model(&model_id)?;
    let template = registry
        .get(&model.template_id)
        .ok_or_else(|| RegistryError::UnknownTemplate(model.template_id.clone()))?;
    let record = store.get_record(&model_id, &item_id)?;
    Ok(Json(ngsi_ld_entity(template, record, &state.export)))
}

async fn get_catalog(State(state): State<AppState>, Path(model_id): Path<String>) -> ApiResult<Json<Value>> {
    let registry = state.registry()?;
    let store = state.store()?;
    let model = store.get_model(&model_id)?;
    let template = registry
        .get(&model.template_id)
        .ok_or_else(|| RegistryError::UnknownTemplate(model.template_id.clone()))?;
    let count = store.list_records(&model_id)?.len();
    Ok(Json(ckan_package(template, model, count, &state.export)))
}
