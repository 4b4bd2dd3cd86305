//! Metrics collection and Prometheus export module.
//!
//! This module provides:
//! - Prometheus recorder setup
//! - The metrics and health HTTP server
//! - Recording functions for the poll cycle and its pipeline stages

use anyhow::Result;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::bot::reply_dispatcher::ReplyOutcome;
use crate::bot::rid_resolver::RidSource;
use crate::observability_config::ObservabilityConfig;

/// Check the bearer token of a metrics request against `METRICS_AUTH_TOKEN`
pub fn check_auth(req: &hyper::Request<hyper::body::Incoming>) -> bool {
    let expected_token = match std::env::var("METRICS_AUTH_TOKEN") {
        Ok(token) if !token.is_empty() => token,
        _ => return true,
    };

    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token == expected_token)
        .unwrap_or(false)
}

/// Install the Prometheus recorder and describe the bot's metrics
pub fn init_metrics_with_config(config: &ObservabilityConfig) -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();

    tracing::info!(
        metrics_enabled = %config.enable_metrics_export,
        "Metrics collection initialized"
    );
    Ok(handle)
}

fn describe_metrics() {
    metrics::describe_counter!("poll_cycles_total", "Poll cycles by result");
    metrics::describe_histogram!("poll_cycle_duration_seconds", "Duration of one poll cycle");
    metrics::describe_counter!("chat_events_total", "Chat events by handling path");
    metrics::describe_counter!("rid_resolutions_total", "RID cascade results by source");
    metrics::describe_counter!("welcome_replies_total", "Welcome reply attempts by outcome");
    metrics::describe_counter!("media_uploads_total", "Media attachments by result");
    metrics::describe_histogram!("media_upload_size_bytes", "Size of uploaded attachments");
    metrics::describe_counter!("orders_stored_total", "New orders stored locally");
    metrics::describe_counter!("event_dedup_resets_total", "Full clears of the event id set");
    metrics::describe_counter!("health_checks_total", "Readiness checks by type and result");
}

/// Serve `/metrics`, `/health/live` and `/health/ready` on the given port.
///
/// Readiness runs the database check when a pool is given.
pub async fn start_metrics_server(
    metrics_handle: PrometheusHandle,
    port: u16,
    db_pool: Option<SqlitePool>,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on {}", addr);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let metrics_handle = metrics_handle.clone();
                    let db_pool = db_pool.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = hyper::service::service_fn(
                            move |req: hyper::Request<hyper::body::Incoming>| {
                                let metrics_handle = metrics_handle.clone();
                                let db_pool = db_pool.clone();
                                async move {
                                    let response = match (req.method(), req.uri().path()) {
                                        (&hyper::Method::GET, "/metrics") => {
                                            if check_auth(&req) {
                                                let mut response =
                                                    hyper::Response::new(metrics_handle.render());
                                                response.headers_mut().insert(
                                                    "content-type",
                                                    hyper::header::HeaderValue::from_static(
                                                        "text/plain; version=0.0.4; charset=utf-8",
                                                    ),
                                                );
                                                response
                                            } else {
                                                text_response(
                                                    hyper::StatusCode::UNAUTHORIZED,
                                                    "Unauthorized",
                                                )
                                            }
                                        }
                                        (&hyper::Method::GET, "/health/live") => {
                                            text_response(hyper::StatusCode::OK, "OK")
                                        }
                                        (&hyper::Method::GET, "/health/ready") => {
                                            match super::health_checks::perform_readiness_checks(
                                                db_pool.as_ref(),
                                            )
                                            .await
                                            {
                                                Ok(()) => text_response(hyper::StatusCode::OK, "OK"),
                                                Err(e) => text_response(
                                                    hyper::StatusCode::SERVICE_UNAVAILABLE,
                                                    &format!("NOT READY: {}", e),
                                                ),
                                            }
                                        }
                                        _ => text_response(hyper::StatusCode::NOT_FOUND, "Not Found"),
                                    };
                                    Ok::<_, std::convert::Infallible>(response)
                                }
                            },
                        );

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await
                        {
                            tracing::error!("Error serving connection: {:?}", err);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Error accepting connection: {}", e);
                }
            }
        }
    });

    Ok(())
}

fn text_response(status: hyper::StatusCode, body: &str) -> hyper::Response<String> {
    let mut response = hyper::Response::new(body.to_string());
    *response.status_mut() = status;
    response
}

/// Record one finished poll cycle
pub fn record_cycle(duration: Duration, success: bool) {
    let result = if success { "success" } else { "partial_failure" };
    metrics::counter!("poll_cycles_total", "result" => result).increment(1);
    metrics::histogram!("poll_cycle_duration_seconds").record(duration.as_secs_f64());
}

/// Record how a chat event was handled
pub fn record_event(path: &'static str) {
    metrics::counter!("chat_events_total", "path" => path).increment(1);
}

/// Record a RID cascade result; `None` means no RID was found
pub fn record_rid_resolution(source: Option<RidSource>) {
    let source = source.map(|s| s.metric_label()).unwrap_or("not_found");
    metrics::counter!("rid_resolutions_total", "source" => source).increment(1);
}

pub fn record_reply(outcome: ReplyOutcome) {
    metrics::counter!("welcome_replies_total", "outcome" => outcome.metric_label()).increment(1);
}

pub fn record_media_upload(success: bool, size_bytes: usize) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!("media_uploads_total", "result" => result).increment(1);
    if success {
        metrics::histogram!("media_upload_size_bytes").record(size_bytes as f64);
    }
}

pub fn record_orders_stored(count: usize) {
    metrics::counter!("orders_stored_total").increment(count as u64);
}

pub fn record_dedup_reset() {
    metrics::counter!("event_dedup_resets_total").increment(1);
}

/// Record health check metrics
pub fn record_health_check_metrics(check_type: &str, success: bool, duration: Duration) {
    let check_type = check_type.to_string();
    let status = if success { "healthy" } else { "unhealthy" };
    metrics::counter!("health_checks_total", "type" => check_type.clone(), "status" => status)
        .increment(1);
    metrics::histogram!("health_check_duration_seconds", "type" => check_type)
        .record(duration.as_secs_f64());
}
