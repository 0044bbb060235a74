//! Configuration management for the CMS service
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (gif-cms.toml)
//! - Environment variables (GIF_CMS__*)
//!
//! ## Example config file (gif-cms.toml):
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//!
//! [registry]
//! include_builtin = true
//! templates_dir = "./templates.d"
//!
//! [validation]
//! reject_unknown_fields = false
//! coerce_strings = true
//!
//! [logging]
//! filter = "gif_cms=debug,info"
//!
//! [export]
//! ckan_owner_org = "city-of-chiyoda"
//! ckan_license_id = "cc-by"
//! ngsi_ld_context = "https://uri.etsi.org/ngsi-ld/v1/ngsi-ld-core-context.jsonld"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::validator::ValidatorOptions;

/// Main configuration for the CMS service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CmsConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Template registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Catalog / context-broker export settings
    #[serde(default)]
    pub export: ExportConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Register the built-in GIF templates at startup
    #[serde(default = "default_true")]
    pub include_builtin: bool,

    /// Directory of extra template definitions (*.json) loaded at startup
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Reject keys the template does not define instead of dropping them
    #[serde(default)]
    pub reject_unknown_fields: bool,

    /// Accept numbers and booleans written as strings
    #[serde(default = "default_true")]
    pub coerce_strings: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// CKAN organization that owns published packages
    #[serde(default)]
    pub ckan_owner_org: String,

    /// CKAN license id
    #[serde(default = "default_license")]
    pub ckan_license_id: String,

    /// JSON-LD context attached to NGSI-LD entities
    #[serde(default = "default_context")]
    pub ngsi_ld_context: String,
}

// Default value functions
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_true() -> bool {
    true
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_license() -> String {
    "cc-by".to_string()
}

fn default_context() -> String {
    "https://uri.etsi.org/ngsi-ld/v1/ngsi-ld-core-context.jsonld".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            include_builtin: true,
            templates_dir: None,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            reject_unknown_fields: false,
            coerce_strings: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ckan_owner_org: String::new(),
            ckan_license_id: default_license(),
            ngsi_ld_context: default_context(),
        }
    }
}

impl From<&ValidationConfig> for ValidatorOptions {
    fn from(config: &ValidationConfig) -> Self {
        Self {
            reject_unknown_fields: config.reject_unknown_fields,
            coerce_strings: config.coerce_strings,
        }
    }
}

impl CmsConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["gif-cms.toml", ".gif-cms.toml", "config/gif-cms.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("jp", "gif", "gif-cms") {
            let xdg_config = config_dir.config_dir().join("gif-cms.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (GIF_CMS__*)
        builder = builder.add_source(
            Environment::with_prefix("GIF_CMS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn validator_options(&self) -> ValidatorOptions {
        ValidatorOptions::from(&self.validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = CmsConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert!(config.registry.include_builtin);
        assert!(config.validation.coerce_strings);
        assert!(!config.validation.reject_unknown_fields);
        assert_eq!(config.export.ckan_license_id, "cc-by");
    }

    #[test]
    fn test_serialize_config() {
        let config = CmsConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[validation]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cms.toml");
        std::fs::write(
            &path,
            "[validation]\nreject_unknown_fields = true\n\n[server]\nbind = \"0.0.0.0:9000\"\n",
        )
        .unwrap();

        let config = CmsConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert!(config.validator_options().reject_unknown_fields);
        assert!(config.validator_options().coerce_strings);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = CmsConfig::default();
        config.export.ckan_owner_org = "city-of-chiyoda".to_string();
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = CmsConfig::load_from(path.to_str()).unwrap();
        assert_eq!(loaded.export.ckan_owner_org, "city-of-chiyoda");
    }
}
