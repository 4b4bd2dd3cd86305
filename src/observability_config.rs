//! # Observability Configuration
//!
//! Environment-specific settings for logging, metrics export and trace export.

use std::env;

use crate::errors::{AppError, AppResult};

/// Service name reported in traces and logs
pub const SERVICE_NAME: &str = "wb-autobot";

/// Observability configuration for different environments
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Environment name (development, staging, production)
    pub environment: String,
    /// OTLP endpoint for trace export
    pub otlp_endpoint: Option<String>,
    /// Port of the metrics and health server
    pub metrics_port: u16,
    /// Log level for the crate's own targets
    pub log_level: String,
    /// Emit JSON log lines even in development
    pub json_logs: bool,
    /// Trace sampling ratio (0.0-1.0)
    pub trace_sampling_ratio: f64,
    /// Whether to serve Prometheus metrics
    pub enable_metrics_export: bool,
    /// Extra resource attributes attached to exported traces
    pub tags: Vec<(String, String)>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            otlp_endpoint: None,
            metrics_port: 9090,
            log_level: "info".to_string(),
            json_logs: false,
            trace_sampling_ratio: 1.0,
            enable_metrics_export: true,
            tags: Vec::new(),
        }
    }
}

impl ObservabilityConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.trim().is_empty()),
            metrics_port: env::var("METRICS_PORT")
                .unwrap_or_else(|_| "9090".to_string())
                .parse()
                .unwrap_or(9090),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            json_logs: env::var("LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            trace_sampling_ratio: env::var("TRACE_SAMPLING_RATIO")
                .unwrap_or_else(|_| "1.0".to_string())
                .parse()
                .unwrap_or(1.0),
            enable_metrics_export: env::var("ENABLE_METRICS_EXPORT")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            tags: env::var("OBSERVABILITY_TAGS")
                .map(|raw| parse_tags(&raw))
                .unwrap_or_default(),
        };
        config.add_default_tags();
        config
    }

    fn add_default_tags(&mut self) {
        self.tags
            .push(("environment".to_string(), self.environment.clone()));
        if let Ok(hostname) = env::var("HOSTNAME") {
            self.tags.push(("hostname".to_string(), hostname));
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Structured JSON output is used everywhere except plain development runs
    pub fn use_json_logs(&self) -> bool {
        self.json_logs || !self.is_development()
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if let Some(endpoint) = &self.otlp_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(AppError::Config(format!(
                    "Invalid OTLP endpoint format: {}",
                    endpoint
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.trace_sampling_ratio) {
            return Err(AppError::Config(format!(
                "Invalid trace sampling ratio: {}",
                self.trace_sampling_ratio
            )));
        }

        if self.metrics_port == 0 {
            return Err(AppError::Config("Metrics port cannot be 0".to_string()));
        }

        Ok(())
    }
}

/// Parse tags from a `key1=value1,key2=value2` string
fn parse_tags(tags_str: &str) -> Vec<(String, String)> {
    tags_str
        .split(',')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(key), Some(value)) if !key.trim().is_empty() => {
                    Some((key.trim().to_string(), value.trim().to_string()))
                }
                _ => None,
            }
        })
        .collect()
}
