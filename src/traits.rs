//! Collaborator seams of the polling bot.
//!
//! The reconciliation core only talks to the outside world through these
//! traits. "Not found" is `Ok(None)`; an `Err` always means the collaborator
//! was unavailable (network, database or disk failure) and the caller is
//! expected to log it and degrade.

use async_trait::async_trait;

use crate::db::{NewTask, Task};
use crate::errors::AppResult;
use crate::wb::types::{ChatSummary, EventsPage, NewOrder};

/// Marketplace listing of new assembly tasks
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// All currently new orders; may be empty
    async fn list_new_orders(&self) -> AppResult<Vec<NewOrder>>;
}

/// Buyer chat transport
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn list_chats(&self) -> AppResult<Vec<ChatSummary>>;

    /// Events after `since` (unix ms); `None` fetches everything the transport still holds
    async fn fetch_events(&self, since: Option<i64>) -> AppResult<EventsPage>;

    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_sign: Option<&str>,
    ) -> AppResult<()>;

    /// Download an attachment by its absolute URL
    async fn download_media(&self, url: &str) -> AppResult<Vec<u8>>;
}

/// Local order store
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_rid(&self, rid: &str) -> AppResult<Option<Task>>;

    async fn find_by_order_uid(&self, order_uid: &str) -> AppResult<Option<Task>>;

    async fn insert_task(&self, task: NewTask) -> AppResult<()>;
}

/// Remote object storage
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Create a folder; an already existing folder counts as success
    async fn ensure_folder(&self, path: &str) -> AppResult<()>;

    async fn upload_bytes(&self, content: Vec<u8>, path: &str) -> AppResult<()>;
}
