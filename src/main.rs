use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use wb_autobot::bot::{Collaborators, EventCycle, FolderLayout, ReplyDispatcher};
use wb_autobot::config::AppConfig;
use wb_autobot::db::{self, SqliteTaskStore};
use wb_autobot::deduplication::EventDeduplicator;
use wb_autobot::disk::YandexDisk;
use wb_autobot::localization;
use wb_autobot::observability;
use wb_autobot::wb::{ChatApi, OrdersApi};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    // Database comes before observability so readiness checks can use it
    let pool = db::connect(&config.database).await?;
    db::init_database_schema(&pool).await?;

    let observability = observability::init_observability(&config.observability, Some(pool.clone()))
        .await
        .context("Failed to initialize observability")?;

    info!("{}", config.summary());
    info!(
        stored_orders = db::count_tasks(&pool).await.unwrap_or(0),
        "Order database ready"
    );

    // Credential check is the only fatal remote failure
    let disk = YandexDisk::new(&config.storage)?;
    disk.check_token()
        .await
        .context("Yandex Disk token check failed")?;
    if let Err(e) = disk
        .ensure_root_folders(&[config.storage.orders_root.as_str(), config.storage.chats_root.as_str()])
        .await
    {
        warn!(error = %e, "Root folders could not be created, continuing");
    }

    let deps = Collaborators {
        orders: Arc::new(OrdersApi::new(&config.marketplace)?),
        chat: Arc::new(ChatApi::new(&config.marketplace)?),
        store: Arc::new(SqliteTaskStore::new(pool.clone())),
        storage: Arc::new(disk),
    };

    let localization_manager = localization::create_localization_manager()?;
    let dispatcher = ReplyDispatcher::new(localization_manager, &config.polling.reply_language);
    let mut cycle = EventCycle::new(
        deps,
        FolderLayout::from(&config.storage),
        EventDeduplicator::new(config.polling.dedup_threshold),
        dispatcher,
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown requested");
                    shutdown.cancel();
                }
                Err(e) => error!(error = %e, "Failed to listen for ctrl-c"),
            }
        });
    }

    cycle.run(config.polling.interval(), shutdown).await;

    pool.close().await;
    observability.shutdown();
    Ok(())
}
