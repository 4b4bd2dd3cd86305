//! Buyer chat API client.
//!
//! Event polling is a long request: the server holds it for up to a minute,
//! so `fetch_events` uses its own timeout just below that.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::config::MarketplaceConfig;
use crate::errors::{error_logging, AppError, AppResult};
use crate::traits::ChatTransport;
use crate::wb::client::{RetryPolicy, WbHttpClient};
use crate::wb::types::{ChatSummary, ChatsResponse, EventsPage, EventsResponse};

/// Timeout for attachment downloads
const MEDIA_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct ChatApi {
    client: WbHttpClient,
    /// Unauthenticated client for CDN downloads, so the API key never leaves the API host
    media_http: reqwest::Client,
    events_timeout: Duration,
}

impl ChatApi {
    pub fn new(config: &MarketplaceConfig) -> AppResult<Self> {
        let retry = RetryPolicy {
            max_attempts: config.retry_max_attempts,
            base_delay_ms: config.retry_base_delay_ms,
            ..RetryPolicy::default()
        };
        let client = WbHttpClient::new(
            &config.chat_api_url,
            &config.chat_api_key,
            config.http_timeout(),
            retry,
        )?;
        let media_http = reqwest::Client::builder()
            .timeout(MEDIA_DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("failed to create media HTTP client: {}", e)))?;

        info!(base_url = %config.chat_api_url, "Chat API client initialized");
        Ok(Self {
            client,
            media_http,
            events_timeout: config.events_timeout(),
        })
    }
}

#[async_trait]
impl ChatTransport for ChatApi {
    async fn list_chats(&self) -> AppResult<Vec<ChatSummary>> {
        let response: ChatsResponse = self
            .client
            .get_json("list_chats", "/chats", &[], None)
            .await?;
        Ok(response.result)
    }

    async fn fetch_events(&self, since: Option<i64>) -> AppResult<EventsPage> {
        let query: Vec<(&str, String)> = since
            .filter(|next| *next > 0)
            .map(|next| vec![("next", next.to_string())])
            .unwrap_or_default();

        let response: EventsResponse = self
            .client
            .get_json("fetch_events", "/events", &query, Some(self.events_timeout))
            .await?;
        debug!(
            since = ?since,
            events = response.result.events.len(),
            next = ?response.result.next,
            "Chat events page received"
        );
        Ok(response.result)
    }

    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_sign: Option<&str>,
    ) -> AppResult<()> {
        let mut payload = json!({
            "chatId": chat_id,
            "message": text,
        });
        if let Some(sign) = reply_sign {
            payload["replySign"] = json!(sign);
        }

        self.client
            .post_json("send_message", "/message", &payload)
            .await?;
        info!(chat_id = %chat_id, "Message sent to chat");
        Ok(())
    }

    async fn download_media(&self, url: &str) -> AppResult<Vec<u8>> {
        let response = self.media_http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error = AppError::Network(format!("media download returned {}", status));
            error_logging::log_network_error(&error, "download_media", Some(url), None);
            return Err(error);
        }
        let bytes = response.bytes().await?;
        debug!(size_bytes = bytes.len(), "Media downloaded");
        Ok(bytes.to_vec())
    }
}
