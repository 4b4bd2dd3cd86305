//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Metrics collection and Prometheus export
//! - Distributed tracing with OpenTelemetry
//! - Structured logging with configurable levels
//! - Health check endpoints for monitoring

pub mod health_checks;
pub mod metrics;
pub mod tracing_mod;

use std::time::Duration;

use anyhow::Result;
use opentelemetry_sdk::trace::SdkTracerProvider;
use sqlx::SqlitePool;

use crate::observability_config::ObservabilityConfig;

pub use health_checks::{check_database_health, perform_readiness_checks, start_health_metrics_recorder};
pub use metrics::{
    record_cycle, record_dedup_reset, record_event, record_health_check_metrics,
    record_media_upload, record_orders_stored, record_reply, record_rid_resolution,
};
pub use tracing_mod::cycle_span;

const HEALTH_CHECK_PERIOD: Duration = Duration::from_secs(30);

/// Handle to the parts of the observability stack that need an orderly stop
#[derive(Default)]
pub struct ObservabilityGuard {
    tracer_provider: Option<SdkTracerProvider>,
    health_recorder: Option<tokio::task::JoinHandle<()>>,
}

impl ObservabilityGuard {
    /// Flush pending spans and stop background recorders
    pub fn shutdown(self) {
        if let Some(handle) = self.health_recorder {
            handle.abort();
        }
        if let Some(provider) = self.tracer_provider {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "OpenTelemetry tracer provider shutdown failed");
            }
        }
    }
}

/// Initialize the complete observability stack
///
/// Logging comes up first so later steps can report. The metrics server and
/// the periodic database health recorder only start when metrics export is
/// enabled.
pub async fn init_observability(
    config: &ObservabilityConfig,
    db_pool: Option<SqlitePool>,
) -> Result<ObservabilityGuard> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    tracing_mod::init_tracing_with_config(config)?;

    let mut guard = ObservabilityGuard::default();

    if config.enable_metrics_export {
        let metrics_handle = metrics::init_metrics_with_config(config)?;
        metrics::start_metrics_server(metrics_handle, config.metrics_port, db_pool.clone()).await?;

        if let Some(pool) = db_pool {
            guard.health_recorder = Some(start_health_metrics_recorder(pool, HEALTH_CHECK_PERIOD));
        }
    } else {
        tracing::info!("Metrics export disabled");
    }

    guard.tracer_provider = tracing_mod::init_opentelemetry_tracing_with_config(config)?;

    tracing::info!(
        environment = %config.environment,
        otlp_endpoint = ?config.otlp_endpoint,
        metrics_port = %config.metrics_port,
        "Observability stack initialized successfully"
    );
    Ok(guard)
}
