//! Service configuration.
//!
//! Layered sources: optional config files (`config/fauna`, then
//! `/etc/fauna-watch/fauna`), overridden by `FAUNA__SECTION__KEY`
//! environment variables. Validation runs at startup and fails fast: the
//! server never accepts frames with a missing classifier endpoint or
//! half-configured notification credentials.

use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    MissingRequired(String),

    #[error("invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),
}

/// Main configuration for the detection gateway
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// HTTP ingest API configuration
    #[serde(default)]
    pub http: HttpConfig,
    /// Frame and log storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Classifier sidecar configuration
    pub classifier: ClassifierConfig,
    /// SMS notification configuration
    pub notify: NotifyConfig,
    /// Notification gating configuration
    #[serde(default)]
    pub gating: GatingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prometheus metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// HTTP ingest API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Listen address
    #[serde(default = "default_http_host")]
    pub host: String,
    /// Listen port
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,
    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Frame and detection-log storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory accepted frames are written into, one subdirectory per
    /// camera
    #[serde(default = "default_frames_dir")]
    pub frames_dir: String,
    /// Append-only detection log file
    #[serde(default = "default_detection_log")]
    pub detection_log: String,
}

/// Classifier sidecar configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Endpoint the frame image is POSTed to
    pub endpoint: String,
    /// Request timeout in seconds
    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,
}

/// SMS notification configuration (Twilio)
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Twilio account SID
    pub account_sid: String,
    /// Twilio auth token
    pub auth_token: String,
    /// Sending phone number, E.164
    pub from_number: String,
    /// Recipient phone numbers, E.164
    #[serde(default)]
    pub destinations: Vec<String>,
}

/// Notification gating configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatingConfig {
    /// Minimum confidence, exclusive, before a detection may fire
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Minimum seconds between two notifications for the same label
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Label the classifier emits when no animal is present
    #[serde(default = "default_empty_label")]
    pub empty_label: String,
    /// Labels recorded in the detection log but never texted out
    #[serde(default = "default_log_only_labels")]
    pub log_only_labels: HashSet<String>,
}

// Default value functions
fn default_service_name() -> String {
    "fauna-watch".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_frames_dir() -> String {
    "frames".to_string()
}

fn default_detection_log() -> String {
    "detections.log".to_string()
}

fn default_classifier_timeout_secs() -> u64 {
    30
}

fn default_confidence_threshold() -> f64 {
    0.9
}

fn default_cooldown_secs() -> u64 {
    1800
}

fn default_empty_label() -> String {
    "empty".to_string()
}

fn default_log_only_labels() -> HashSet<String> {
    ["squirrel".to_string()].into_iter().collect()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            cors_enabled: false,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            frames_dir: default_frames_dir(),
            detection_log: default_detection_log(),
        }
    }
}

impl Default for GatingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            cooldown_secs: default_cooldown_secs(),
            empty_label: default_empty_label(),
            log_only_labels: default_log_only_labels(),
        }
    }
}

impl GatingConfig {
    /// Cooldown window as a chrono duration for timestamp arithmetic
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_secs as i64)
    }
}

impl ClassifierConfig {
    /// Classifier request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/fauna").required(false))
            .add_source(config::File::with_name("/etc/fauna-watch/fauna").required(false))
            // FAUNA__NOTIFY__ACCOUNT_SID -> notify.account_sid
            .add_source(
                config::Environment::with_prefix("FAUNA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service cannot safely start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classifier.endpoint.is_empty() {
            return Err(ConfigError::MissingRequired(
                "classifier.endpoint".to_string(),
            ));
        }
        if self.notify.account_sid.is_empty() {
            return Err(ConfigError::MissingRequired("notify.account_sid".to_string()));
        }
        if self.notify.auth_token.is_empty() {
            return Err(ConfigError::MissingRequired("notify.auth_token".to_string()));
        }
        if self.notify.from_number.is_empty() {
            return Err(ConfigError::MissingRequired("notify.from_number".to_string()));
        }
        if self.notify.destinations.is_empty() {
            return Err(ConfigError::MissingRequired(
                "notify.destinations".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.gating.confidence_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "gating.confidence_threshold".to_string(),
                message: format!(
                    "{} is outside [0.0, 1.0]",
                    self.gating.confidence_threshold
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            service: ServiceConfig::default(),
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
            classifier: ClassifierConfig {
                endpoint: "http://127.0.0.1:5001/predict".to_string(),
                timeout_secs: default_classifier_timeout_secs(),
            },
            notify: NotifyConfig {
                account_sid: "AC0000".to_string(),
                auth_token: "token".to_string(),
                from_number: "+12345678901".to_string(),
                destinations: vec!["+19876543210".to_string()],
            },
            gating: GatingConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_destinations_fails_fast() {
        let mut config = valid_config();
        config.notify.destinations.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(key)) if key == "notify.destinations"
        ));
    }

    #[test]
    fn test_missing_classifier_endpoint_fails_fast() {
        let mut config = valid_config();
        config.classifier.endpoint.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(key)) if key == "classifier.endpoint"
        ));
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let mut config = valid_config();
        config.gating.confidence_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_gating_defaults() {
        let gating = GatingConfig::default();
        assert_eq!(gating.confidence_threshold, 0.9);
        assert_eq!(gating.cooldown_secs, 1800);
        assert_eq!(gating.empty_label, "empty");
        assert!(gating.log_only_labels.contains("squirrel"));
    }
}
