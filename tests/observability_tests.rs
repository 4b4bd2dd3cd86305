//! # Observability Tests Module
//!
//! Metrics recording, span helpers and readiness checks as seen from outside
//! the crate.

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use wb_autobot::bot::{ReplyOutcome, RidSource};
    use wb_autobot::observability;
    use wb_autobot::observability_config::ObservabilityConfig;

    /// Recording functions are safe to call without an installed recorder
    #[test]
    fn test_metrics_recording() {
        observability::record_cycle(Duration::from_millis(120), true);
        observability::record_cycle(Duration::from_millis(80), false);
        observability::record_event("duplicate");
        observability::record_rid_resolution(Some(RidSource::ChatHistory));
        observability::record_rid_resolution(None);
        observability::record_reply(ReplyOutcome::Failed);
        observability::record_media_upload(false, 0);
        observability::record_orders_stored(0);
        observability::record_dedup_reset();
        observability::record_health_check_metrics("database", true, Duration::from_millis(3));
    }

    #[test]
    fn test_cycle_span_creation() {
        let span = observability::cycle_span(42);
        let _entered = span.enter();
    }

    #[tokio::test]
    async fn test_readiness_without_database() {
        assert!(observability::perform_readiness_checks(None).await.is_ok());
    }

    #[tokio::test]
    async fn test_readiness_with_in_memory_database() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        assert!(observability::perform_readiness_checks(Some(&pool)).await.is_ok());

        pool.close().await;
        assert!(observability::check_database_health(&pool).await.is_err());
    }

    #[tokio::test]
    async fn test_init_rejects_invalid_config() {
        let config = ObservabilityConfig {
            trace_sampling_ratio: 2.0,
            ..Default::default()
        };
        assert!(observability::init_observability(&config, None).await.is_err());
    }
}
