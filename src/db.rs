use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::errors::{error_logging, AppError, AppResult};
use crate::traits::OrderStore;

/// Represents an assembly task (order) in the database
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: i64,
    /// Primary order identifier as issued by the marketplace
    pub rid: String,
    pub order_uid: Option<String>,
    pub nm_id: Option<i64>,
    pub article: Option<String>,
    /// Price in major currency units
    pub price: Option<f64>,
    /// Raw creation timestamp as reported by the marketplace
    pub created_at: Option<String>,
    pub status: String,
    pub inserted_at: Option<DateTime<Utc>>,
}

/// Fields of a task about to be stored
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewTask {
    pub rid: String,
    pub order_uid: Option<String>,
    pub nm_id: Option<i64>,
    pub article: Option<String>,
    pub price: Option<f64>,
    pub created_at: Option<String>,
}

const TASK_COLUMNS: &str =
    "id, rid, order_uid, nm_id, article, price, created_at, status, inserted_at";

/// Open a connection pool, creating the database file when it does not exist yet
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid DATABASE_URL '{}'", config.url))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(options)
        .await
        .context("Failed to connect to the order database")?;

    Ok(pool)
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &SqlitePool) -> Result<()> {
    info!("Initializing database schema");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS assembly_tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rid TEXT UNIQUE NOT NULL,
            order_uid TEXT,
            nm_id INTEGER,
            article TEXT,
            price REAL,
            created_at TEXT,
            status TEXT NOT NULL DEFAULT 'new',
            inserted_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create assembly_tasks table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS assembly_tasks_order_uid_idx ON assembly_tasks(order_uid)",
    )
    .execute(pool)
    .await
    .context("Failed to create assembly_tasks order_uid index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Insert a task, replacing any existing row with the same rid
pub async fn upsert_task(pool: &SqlitePool, task: &NewTask) -> Result<()> {
    debug!(rid = %task.rid, order_uid = ?task.order_uid, "Storing assembly task");

    sqlx::query(
        "INSERT OR REPLACE INTO assembly_tasks (rid, order_uid, nm_id, article, price, created_at, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'new')",
    )
    .bind(&task.rid)
    .bind(&task.order_uid)
    .bind(task.nm_id)
    .bind(&task.article)
    .bind(task.price)
    .bind(&task.created_at)
    .execute(pool)
    .await
    .context("Failed to insert assembly task")?;

    info!(rid = %task.rid, "Assembly task stored");
    Ok(())
}

/// Read a task by its primary order identifier
pub async fn get_task_by_rid(pool: &SqlitePool, rid: &str) -> Result<Option<Task>> {
    debug!(rid = %rid, "Reading task by rid");

    let row = sqlx::query(&format!(
        "SELECT {} FROM assembly_tasks WHERE rid = ?1",
        TASK_COLUMNS
    ))
    .bind(rid)
    .fetch_optional(pool)
    .await
    .context("Failed to read task by rid")?;

    Ok(row.map(|row| task_from_row(&row)))
}

/// Read a task by the marketplace order uid
pub async fn get_task_by_order_uid(pool: &SqlitePool, order_uid: &str) -> Result<Option<Task>> {
    debug!(order_uid = %order_uid, "Reading task by order uid");

    let row = sqlx::query(&format!(
        "SELECT {} FROM assembly_tasks WHERE order_uid = ?1 ORDER BY id DESC LIMIT 1",
        TASK_COLUMNS
    ))
    .bind(order_uid)
    .fetch_optional(pool)
    .await
    .context("Failed to read task by order uid")?;

    if let Some(row) = &row {
        let rid: String = row.get("rid");
        info!(order_uid = %order_uid, rid = %rid, "Task found by order uid");
    }

    Ok(row.map(|row| task_from_row(&row)))
}

/// Most recently stored tasks, newest first
pub async fn recent_tasks(pool: &SqlitePool, limit: i64) -> Result<Vec<Task>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM assembly_tasks ORDER BY id DESC LIMIT ?1",
        TASK_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list recent tasks")?;

    Ok(rows.iter().map(task_from_row).collect())
}

/// Number of stored tasks
pub async fn count_tasks(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) FROM assembly_tasks")
        .fetch_one(pool)
        .await
        .context("Failed to count tasks")?;
    Ok(row.get(0))
}

fn task_from_row(row: &sqlx::sqlite::SqliteRow) -> Task {
    Task {
        id: row.get("id"),
        rid: row.get("rid"),
        order_uid: row.get("order_uid"),
        nm_id: row.get("nm_id"),
        article: row.get("article"),
        price: row.get("price"),
        created_at: row.get("created_at"),
        status: row.get("status"),
        inserted_at: row.try_get("inserted_at").ok(),
    }
}

/// `OrderStore` backed by the local SQLite database
#[derive(Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn database_error(err: anyhow::Error, operation: &str, key: &str) -> AppError {
    let error = AppError::Database(format!("{:#}", err));
    error_logging::log_database_error(&error, operation, Some(key));
    error
}

#[async_trait]
impl OrderStore for SqliteTaskStore {
    async fn find_by_rid(&self, rid: &str) -> AppResult<Option<Task>> {
        get_task_by_rid(&self.pool, rid)
            .await
            .map_err(|e| database_error(e, "find_by_rid", rid))
    }

    async fn find_by_order_uid(&self, order_uid: &str) -> AppResult<Option<Task>> {
        get_task_by_order_uid(&self.pool, order_uid)
            .await
            .map_err(|e| database_error(e, "find_by_order_uid", order_uid))
    }

    async fn insert_task(&self, task: NewTask) -> AppResult<()> {
        upsert_task(&self.pool, &task)
            .await
            .map_err(|e| database_error(e, "insert_task", &task.rid))
    }
}
