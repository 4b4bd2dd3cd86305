//! Health check functionality module.

use anyhow::Result;
use sqlx::SqlitePool;
use std::time::{Duration, Instant};

/// Perform readiness checks
pub async fn perform_readiness_checks(db_pool: Option<&SqlitePool>) -> Result<()> {
    if let Some(pool) = db_pool {
        check_database_health(pool).await?;
    }
    Ok(())
}

/// Check database connectivity and basic query capability
pub async fn check_database_health(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Database health check failed: {}", e))?;

    tracing::debug!("Database health check passed");
    Ok(())
}

/// Start a background task that records database health every `period`
pub fn start_health_metrics_recorder(
    db_pool: SqlitePool,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;

            let check_start = Instant::now();
            let db_healthy = check_database_health(&db_pool).await.is_ok();
            super::metrics::record_health_check_metrics("database", db_healthy, check_start.elapsed());
        }
    })
}
