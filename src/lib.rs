//! GIF CMS
//!
//! Template registry, record validator and in-memory record store for
//! Japanese open-government datasets following the GIF standard.
//!
//! ## Features
//!
//! - **Templates**: built-in GIF recommended datasets plus runtime registration
//! - **Validation**: typed fields, full-match patterns, controlled vocabularies,
//!   mandatory marks and coordinate rules
//! - **Records**: models (template instances) collecting validated records
//! - **Export**: CKAN package and NGSI-LD entity bodies
//! - **HTTP**: an axum router over all of the above
//!
//! ## Validation flow
//!
//! ```text
//! submission ──> resolve template ──> field pass ──> mandatory pass ──> coordinate pass ──> Record
//!                      │                  │                │                  │
//!                      └──────────────────┴────────────────┴──────────────────┴──> [field: message, ...]
//! ```

pub mod api;
pub mod builtin;
pub mod checksum;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod registry;
pub mod schema;
pub mod store;
pub mod validator;

pub use api::{build_router, AppState};
pub use checksum::Checksum;
pub use config::CmsConfig;
pub use error::{RegistryError, Result, ValidationFailure, Violation, ViolationKind};
pub use registry::TemplateRegistry;
pub use schema::{FieldDefinition, FieldKind, FieldPattern, FieldValue, Template, TemplateDefinition};
pub use store::{Model, Record, RecordStore};
pub use validator::{ValidatedRecord, Validator, ValidatorOptions};
