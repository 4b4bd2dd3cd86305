//! Marketplace order API client.

use async_trait::async_trait;
use tracing::info;

use crate::config::MarketplaceConfig;
use crate::errors::AppResult;
use crate::traits::OrderSource;
use crate::wb::client::{RetryPolicy, WbHttpClient};
use crate::wb::types::{NewOrder, NewOrdersResponse};

/// Client for `GET /orders/new`
#[derive(Clone)]
pub struct OrdersApi {
    client: WbHttpClient,
}

impl OrdersApi {
    pub fn new(config: &MarketplaceConfig) -> AppResult<Self> {
        let retry = RetryPolicy {
            max_attempts: config.retry_max_attempts,
            base_delay_ms: config.retry_base_delay_ms,
            ..RetryPolicy::default()
        };
        let client = WbHttpClient::new(
            &config.marketplace_api_url,
            &config.api_key,
            config.http_timeout(),
            retry,
        )?;
        info!(base_url = %config.marketplace_api_url, "Marketplace order API client initialized");
        Ok(Self { client })
    }
}

#[async_trait]
impl OrderSource for OrdersApi {
    async fn list_new_orders(&self) -> AppResult<Vec<NewOrder>> {
        let response: NewOrdersResponse = self
            .client
            .get_json("list_new_orders", "/orders/new", &[], None)
            .await?;
        info!(count = response.orders.len(), "New orders received from marketplace");
        Ok(response.orders)
    }
}
