//! Tracing and logging setup module.
//!
//! This module provides:
//! - Structured logging configuration
//! - OpenTelemetry span export over OTLP
//! - Span helpers for the poll loop

use anyhow::Result;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_subscriber::prelude::*;

use crate::observability_config::{ObservabilityConfig, SERVICE_NAME};

/// Build the log filter: the crate at the configured level, noisy dependencies at `warn`
pub fn build_env_filter(config: &ObservabilityConfig) -> Result<tracing_subscriber::EnvFilter> {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("wb_autobot={}", config.log_level).parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    if let Ok(obs_log) = std::env::var("OBSERVABILITY_LOG_LEVEL") {
        filter = filter.add_directive(format!("wb_autobot::observability={}", obs_log).parse()?);
    }

    Ok(filter)
}

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = build_env_filter(config)?;

    if config.use_json_logs() {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()?;
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        json = config.use_json_logs(),
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Install the OTLP span exporter when an endpoint is configured.
///
/// Returns the provider so the caller can flush it on shutdown.
pub fn init_opentelemetry_tracing_with_config(
    config: &ObservabilityConfig,
) -> Result<Option<SdkTracerProvider>> {
    let endpoint = match &config.otlp_endpoint {
        Some(endpoint) => endpoint,
        None => {
            tracing::info!("OpenTelemetry tracing disabled (no OTLP endpoint configured)");
            return Ok(None);
        }
    };

    let otlp_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .build()?;

    let resource = Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attributes(
            config
                .tags
                .iter()
                .map(|(key, value)| KeyValue::new(key.clone(), value.clone())),
        )
        .build();

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(otlp_exporter)
        .with_sampler(Sampler::TraceIdRatioBased(config.trace_sampling_ratio))
        .with_resource(resource)
        .build();

    global::set_tracer_provider(tracer_provider.clone());

    tracing::info!(
        otlp_endpoint = %endpoint,
        trace_sampling_ratio = %config.trace_sampling_ratio,
        "OpenTelemetry tracing initialized with OTLP export"
    );
    Ok(Some(tracer_provider))
}

/// Span covering one poll cycle
pub fn cycle_span(iteration: u64) -> tracing::Span {
    tracing::info_span!("poll_cycle", iteration = iteration, component = "event_cycle")
}
