//! Tracing configuration
//!
//! Parametrizes provider construction: service identity, exporter
//! endpoint and export mode. The dispatch and lifecycle code only ever
//! sees the resulting `Tracing` state.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracebus_span::ExportMode;

pub const DEFAULT_SERVICE_NAME: &str = "microservice";
pub const DEFAULT_SERVICE_VERSION: &str = "1.0.0";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4318/v1/traces";
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 2048;
pub const DEFAULT_INSTRUMENTATION_NAME: &str = "tracebus";

/// Path the OTLP/HTTP trace endpoint must end with.
pub const TRACES_PATH: &str = "/v1/traces";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Service name must not be empty")]
    EmptyServiceName,

    #[error("Exporter endpoint must be an http(s) URL: {0}")]
    InvalidEndpoint(String),

    #[error("Max queue size must be greater than zero")]
    ZeroQueueSize,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Tracing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Enable span creation and flushing
    pub enabled: bool,

    /// `service.name` resource attribute
    pub service_name: String,

    /// `service.version` resource attribute
    pub service_version: String,

    /// `deployment.environment.name` resource attribute
    pub environment: String,

    /// OTLP/HTTP traces endpoint
    pub otlp_endpoint: String,

    /// Queue spans and export on flush, instead of exporting each on end
    pub use_batch_processor: bool,

    /// Queued spans that trigger an export in batch mode
    pub max_queue_size: usize,

    /// Name tracers are requested under
    pub instrumentation_name: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_version: DEFAULT_SERVICE_VERSION.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            use_batch_processor: true,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            instrumentation_name: DEFAULT_INSTRUMENTATION_NAME.to_string(),
        }
    }
}

impl TracingConfig {
    /// Create a new config builder
    pub fn builder() -> TracingConfigBuilder {
        TracingConfigBuilder::new()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any variable source. Unset, blank or unparsable
    /// values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            enabled: lookup("TRACING_ENABLED")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.enabled),
            service_name: lookup("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
            service_version: lookup("OTEL_SERVICE_VERSION").unwrap_or(defaults.service_version),
            environment: lookup("OTEL_ENVIRONMENT").unwrap_or(defaults.environment),
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT")
                .map(|v| normalize_endpoint(&v))
                .unwrap_or(defaults.otlp_endpoint),
            use_batch_processor: lookup("OTEL_USE_BATCH_PROCESSOR")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.use_batch_processor),
            max_queue_size: lookup("OTEL_MAX_QUEUE_SIZE")
                .map(|v| v.trim().parse().unwrap_or(defaults.max_queue_size))
                .unwrap_or(defaults.max_queue_size),
            instrumentation_name: defaults.instrumentation_name,
        }
    }

    pub fn export_mode(&self) -> ExportMode {
        if self.use_batch_processor {
            ExportMode::Batch
        } else {
            ExportMode::Immediate
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::EmptyServiceName);
        }
        if !(self.otlp_endpoint.starts_with("http://") || self.otlp_endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidEndpoint(self.otlp_endpoint.clone()));
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::ZeroQueueSize);
        }
        Ok(())
    }
}

/// Parse `1/true/yes/on` and `0/false/no/off`, case-insensitively.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Append the traces path to a collector base URL unless already present.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with(TRACES_PATH) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, TRACES_PATH)
    }
}

/// Builder for TracingConfig
pub struct TracingConfigBuilder {
    config: TracingConfig,
}

impl TracingConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            config: TracingConfig::default(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.service_name = name.into();
        self
    }

    pub fn service_version(mut self, version: impl Into<String>) -> Self {
        self.config.service_version = version.into();
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.config.environment = environment.into();
        self
    }

    /// Set the collector endpoint; the traces path is appended if missing
    pub fn otlp_endpoint(mut self, endpoint: impl AsRef<str>) -> Self {
        self.config.otlp_endpoint = normalize_endpoint(endpoint.as_ref());
        self
    }

    pub fn use_batch_processor(mut self, batch: bool) -> Self {
        self.config.use_batch_processor = batch;
        self
    }

    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.max_queue_size = size;
        self
    }

    pub fn instrumentation_name(mut self, name: impl Into<String>) -> Self {
        self.config.instrumentation_name = name.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> TracingConfig {
        self.config
    }
}

impl Default for TracingConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.service_name, "microservice");
        assert_eq!(config.service_version, "1.0.0");
        assert_eq!(config.environment, "development");
        assert_eq!(config.otlp_endpoint, "http://localhost:4318/v1/traces");
        assert!(config.use_batch_processor);
        assert_eq!(config.max_queue_size, 2048);
        assert_eq!(config.export_mode(), ExportMode::Batch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let config = TracingConfig::from_lookup(lookup(&[
            ("TRACING_ENABLED", "Yes"),
            ("OTEL_SERVICE_NAME", "orders"),
            ("OTEL_SERVICE_VERSION", "2.3.0"),
            ("OTEL_ENVIRONMENT", "production"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4318/"),
            ("OTEL_USE_BATCH_PROCESSOR", "off"),
            ("OTEL_MAX_QUEUE_SIZE", "64"),
        ]));

        assert!(config.enabled);
        assert_eq!(config.service_name, "orders");
        assert_eq!(config.service_version, "2.3.0");
        assert_eq!(config.environment, "production");
        assert_eq!(config.otlp_endpoint, "http://collector:4318/v1/traces");
        assert!(!config.use_batch_processor);
        assert_eq!(config.export_mode(), ExportMode::Immediate);
        assert_eq!(config.max_queue_size, 64);
    }

    #[test]
    fn test_unparsable_values_keep_defaults() {
        let config = TracingConfig::from_lookup(lookup(&[
            ("TRACING_ENABLED", "sometimes"),
            ("OTEL_USE_BATCH_PROCESSOR", "maybe"),
            ("OTEL_MAX_QUEUE_SIZE", "lots"),
        ]));

        assert!(!config.enabled);
        assert!(config.use_batch_processor);
        assert_eq!(config.max_queue_size, DEFAULT_MAX_QUEUE_SIZE);
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = TracingConfig::from_lookup(lookup(&[
            ("OTEL_SERVICE_NAME", ""),
            ("OTEL_SERVICE_VERSION", "  "),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", " "),
            ("OTEL_MAX_QUEUE_SIZE", ""),
        ]));

        assert_eq!(config.service_name, DEFAULT_SERVICE_NAME);
        assert_eq!(config.service_version, DEFAULT_SERVICE_VERSION);
        assert_eq!(config.otlp_endpoint, DEFAULT_OTLP_ENDPOINT);
        assert_eq!(config.max_queue_size, DEFAULT_MAX_QUEUE_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_bool() {
        for v in ["1", "true", "TRUE", "yes", "On"] {
            assert_eq!(parse_bool(v), Some(true), "{}", v);
        }
        for v in ["0", "false", "No", "off"] {
            assert_eq!(parse_bool(v), Some(false), "{}", v);
        }
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("http://c:4318"), "http://c:4318/v1/traces");
        assert_eq!(normalize_endpoint("http://c:4318/v1/traces"), "http://c:4318/v1/traces");
        assert_eq!(normalize_endpoint("http://c:4318/v1/traces/"), "http://c:4318/v1/traces");
    }

    #[test]
    fn test_validate() {
        let config = TracingConfig::builder().service_name("  ").build();
        assert_eq!(config.validate(), Err(ConfigError::EmptyServiceName));

        let config = TracingConfig::builder().otlp_endpoint("grpc://c:4317").build();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidEndpoint(_))));

        let config = TracingConfig::builder().max_queue_size(0).build();
        assert_eq!(config.validate(), Err(ConfigError::ZeroQueueSize));
    }

    #[test]
    fn test_serde_defaults() {
        let config: TracingConfig = serde_json::from_str(r#"{"enabled": true, "service_name": "orders"}"#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.service_name, "orders");
        assert_eq!(config.service_version, DEFAULT_SERVICE_VERSION);
        assert_eq!(config.max_queue_size, DEFAULT_MAX_QUEUE_SIZE);
    }
}
