//! Configuration management for the policy client.
//!
//! Configuration is layered:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML, optional)
//! 3. Environment variables (override)
//!
//! Environment variables use the `VEILSYNC_` prefix and `__` as the nesting
//! separator, e.g. `VEILSYNC_SYNC__REFRESH_INTERVAL_SECS=300` overrides
//! `sync.refresh_interval_secs`.
//!
//! # Example
//!
//! ```ignore
//! use veilsync_client::config::ClientConfig;
//!
//! let config = ClientConfig::load("veilsync.yaml")?;
//! let config = ClientConfig::from_env()?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use url::Url;
use veilsync_storage::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, StorageResult};

use crate::coordinator::CoordinatorSettings;
use crate::observability::LoggingConfig;

/// Client configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ClientConfig {
    /// Policy service endpoint
    #[serde(default)]
    pub transport: TransportSettings,

    /// Sync scheduling and client identification
    #[serde(default)]
    pub sync: SyncSettings,

    /// Persistent store
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Policy service endpoint settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TransportSettings {
    /// URL the sync request is POSTed to
    #[serde(default = "default_settings_url")]
    pub settings_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            settings_url: default_settings_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl TransportSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_settings_url() -> String {
    "https://messenger.cloudveil.org/api/v1/messenger/settings".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Sync scheduling and the client info sent with every request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SyncSettings {
    /// Minimum age of the last identical request before it is resent
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_client_os_type")]
    pub client_os_type: String,

    #[serde(default)]
    pub client_version_code: String,

    #[serde(default)]
    pub client_version_name: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            client_os_type: default_client_os_type(),
            client_version_code: String::new(),
            client_version_name: String::new(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    600
}

fn default_client_os_type() -> String {
    "iOS".to_string()
}

/// Persistent store settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageSettings {
    /// Storage backend: "memory" or "file"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Root directory of the file backend
    #[serde(default)]
    pub data_path: Option<String>,

    /// Namespace shared by every process of the host application
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            data_path: None,
            namespace: default_namespace(),
        }
    }
}

impl StorageSettings {
    /// Opens the configured store.
    ///
    /// Call [`ClientConfig::validate`] first; an unknown backend or a file
    /// backend without `data_path` falls back to memory here.
    pub fn open_store(&self) -> StorageResult<Arc<dyn KeyValueStore>> {
        let backend = (self.backend.as_str(), self.data_path.as_deref());
        let store: Arc<dyn KeyValueStore> = match backend {
            ("file", Some(path)) => {
                FileKeyValueStore::open_shared(PathBuf::from(path), self.namespace.as_str())?
            }
            _ => MemoryKeyValueStore::new_shared(self.namespace.as_str())?,
        };
        Ok(store)
    }
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_namespace() -> String {
    "group.com.cloudveil.CloudVeilMessenger".to_string()
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LoggingSettings {
    pub fn to_logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_settings(&self.level, self.json)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ClientConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ClientConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(env_source())
            .build()?;

        let client_config: ClientConfig = config.try_deserialize()?;
        client_config.validate()?;

        Ok(client_config)
    }

    /// Load configuration from defaults and environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ClientConfig::default())?)
            .add_source(env_source())
            .build()?;

        let client_config: ClientConfig = config.try_deserialize()?;
        client_config.validate()?;

        Ok(client_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let settings_url = self.transport.settings_url.trim();
        if settings_url.is_empty() {
            return Err(invalid("transport.settings_url must not be empty"));
        }
        match Url::parse(settings_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(invalid(format!(
                    "transport.settings_url must be http or https, got scheme: {}",
                    url.scheme()
                )))
            }
            Err(e) => {
                return Err(invalid(format!(
                    "transport.settings_url is not a valid URL: {e}"
                )))
            }
        }

        if self.transport.request_timeout_secs == 0 {
            return Err(invalid(
                "transport.request_timeout_secs must be greater than 0",
            ));
        }

        if self.sync.refresh_interval_secs == 0 {
            return Err(invalid("sync.refresh_interval_secs must be greater than 0"));
        }

        let valid_backends = ["memory", "file"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(invalid(format!(
                "storage.backend must be one of: {:?}, got: {}",
                valid_backends, self.storage.backend
            )));
        }

        if self.storage.backend == "file"
            && self
                .storage
                .data_path
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
        {
            return Err(invalid(
                "storage.data_path is required when backend is 'file'",
            ));
        }

        if let Err(e) = veilsync_storage::validate_namespace(&self.storage.namespace) {
            return Err(invalid(format!("storage.namespace is invalid: {e}")));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(invalid(format!(
                "logging.level must be one of: {:?}, got: {}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }

    /// Coordinator settings derived from the `transport` and `sync` sections.
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            refresh_interval: Duration::from_secs(self.sync.refresh_interval_secs),
            request_timeout: self.transport.request_timeout(),
            client_os_type: self.sync.client_os_type.clone(),
            client_version_code: self.sync.client_version_code.clone(),
            client_version_name: self.sync.client_version_name.clone(),
        }
    }
}

// VEILSYNC_SYNC__REFRESH_INTERVAL_SECS -> sync.refresh_interval_secs
fn env_source() -> Environment {
    Environment::with_prefix("VEILSYNC")
        .prefix_separator("_")
        .separator("__")
}

fn invalid(message: impl Into<String>) -> ConfigLoadError {
    ConfigLoadError::Invalid {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_can_load_config_from_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
transport:
  settings_url: "http://127.0.0.1:9000/settings"
  request_timeout_secs: 3

sync:
  refresh_interval_secs: 120
  client_version_code: "512"
  client_version_name: "2.1.0"

storage:
  backend: memory
  namespace: test.namespace

logging:
  level: debug
  json: true
"#
        )
        .unwrap();

        let config = ClientConfig::load(file.path()).unwrap();

        assert_eq!(config.transport.settings_url, "http://127.0.0.1:9000/settings");
        assert_eq!(config.transport.request_timeout_secs, 3);
        assert_eq!(config.sync.refresh_interval_secs, 120);
        assert_eq!(config.sync.client_os_type, "iOS");
        assert_eq!(config.sync.client_version_code, "512");
        assert_eq!(config.sync.client_version_name, "2.1.0");
        assert_eq!(config.storage.namespace, "test.namespace");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    #[serial]
    fn test_can_override_config_with_env_vars() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
sync:
  refresh_interval_secs: 120
"#
        )
        .unwrap();

        std::env::set_var("VEILSYNC_SYNC__REFRESH_INTERVAL_SECS", "30");
        std::env::set_var("VEILSYNC_LOGGING__LEVEL", "warn");

        let result = ClientConfig::load(file.path());

        std::env::remove_var("VEILSYNC_SYNC__REFRESH_INTERVAL_SECS");
        std::env::remove_var("VEILSYNC_LOGGING__LEVEL");

        let config = result.unwrap();
        assert_eq!(config.sync.refresh_interval_secs, 30);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.transport.request_timeout_secs, 10);
    }

    #[test]
    #[serial]
    fn test_from_env_loads_defaults_with_env_overrides() {
        std::env::set_var("VEILSYNC_STORAGE__NAMESPACE", "group.example.shared");

        let result = ClientConfig::from_env();

        std::env::remove_var("VEILSYNC_STORAGE__NAMESPACE");

        let config = result.unwrap();
        assert_eq!(config.storage.namespace, "group.example.shared");
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.sync.refresh_interval_secs, 600);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());

        assert_eq!(
            config.transport.settings_url,
            "https://messenger.cloudveil.org/api/v1/messenger/settings"
        );
        assert_eq!(config.transport.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.sync.refresh_interval_secs, 600);
        assert_eq!(config.sync.client_os_type, "iOS");
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(
            config.storage.namespace,
            "group.com.cloudveil.CloudVeilMessenger"
        );
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_config_validation_catches_errors() {
        let cases: [(fn(&mut ClientConfig), &str); 10] = [
            (|c| c.transport.settings_url = "  ".to_string(), "settings_url"),
            (|c| c.transport.settings_url = "not a url".to_string(), "settings_url"),
            (|c| c.transport.settings_url = "ftp://example.org/".to_string(), "settings_url"),
            (|c| c.transport.request_timeout_secs = 0, "request_timeout_secs"),
            (|c| c.sync.refresh_interval_secs = 0, "refresh_interval_secs"),
            (|c| c.storage.backend = "sqlite".to_string(), "storage.backend"),
            (|c| c.storage.backend = "file".to_string(), "data_path"),
            (
                |c| {
                    c.storage.backend = "file".to_string();
                    c.storage.data_path = Some("   ".to_string());
                },
                "data_path",
            ),
            (|c| c.storage.namespace = "a/b".to_string(), "storage.namespace"),
            (|c| c.logging.level = "chatty".to_string(), "logging.level"),
        ];

        for (mutate, expected) in cases {
            let mut config = ClientConfig::default();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "expected error mentioning '{expected}', got: {err}"
            );
        }
    }

    #[test]
    fn test_invalid_config_returns_clear_error() {
        let err = ClientConfig::load("/nonexistent/path/veilsync.yaml").unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileNotFound { .. }));
        assert!(err.to_string().contains("not found"));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid: yaml: syntax: [").unwrap();

        let err = ClientConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Load(_)));
    }

    #[test]
    fn test_coordinator_settings_follow_config() {
        let mut config = ClientConfig::default();
        config.sync.refresh_interval_secs = 60;
        config.transport.request_timeout_secs = 2;
        config.sync.client_version_name = "3.0".to_string();

        let settings = config.coordinator_settings();

        assert_eq!(settings.refresh_interval, Duration::from_secs(60));
        assert_eq!(settings.request_timeout, Duration::from_secs(2));
        assert_eq!(settings.client_os_type, "iOS");
        assert_eq!(settings.client_version_name, "3.0");
    }

    #[test]
    fn test_open_store_honours_backend() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StorageSettings {
            backend: "file".to_string(),
            data_path: Some(dir.path().display().to_string()),
            namespace: "group.test".to_string(),
        };

        let store = settings.open_store().unwrap();
        store.set("policy_snapshot", b"{}").unwrap();

        let reopened = settings.open_store().unwrap();
        assert_eq!(
            reopened.get("policy_snapshot").unwrap().as_deref(),
            Some(&b"{}"[..])
        );

        let memory = StorageSettings::default().open_store().unwrap();
        assert_eq!(memory.namespace(), "group.com.cloudveil.CloudVeilMessenger");
        assert_eq!(memory.get("policy_snapshot").unwrap(), None);
    }
}
