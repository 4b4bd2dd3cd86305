//! One-time welcome reply per chat.
//!
//! A chat receives the welcome message at most once per process lifetime.
//! A chat is recorded as processed only after the transport accepted the
//! message, so a failed send is retried on the next client event of that chat.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::bot::Collaborators;
use crate::errors::error_logging;
use crate::localization::LocalizationManager;
use crate::wb::types::ChatEvent;

/// Rendering of order dates in replies
pub const ORDER_DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Order creation time as known to the bot
#[derive(Debug, Clone, PartialEq)]
pub enum OrderDate {
    Timestamp(DateTime<FixedOffset>),
    /// Unparsed value as reported by the marketplace
    Raw(String),
    Unknown,
}

impl OrderDate {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if !value.is_empty() => OrderDate::Raw(value.to_string()),
            _ => OrderDate::Unknown,
        }
    }
}

/// Format an order date as `DD.MM.YYYY HH:MM`.
///
/// Strings are read as ISO-8601 with optional fractional seconds and an
/// optional `Z`/offset suffix and are rendered in their own offset. A string
/// that does not parse is returned unchanged. `None` means the date is
/// unknown and the caller substitutes its placeholder.
pub fn format_order_date(date: &OrderDate) -> Option<String> {
    match date {
        OrderDate::Timestamp(timestamp) => Some(timestamp.format(ORDER_DATE_FORMAT).to_string()),
        OrderDate::Raw(raw) => Some(
            parse_order_timestamp(raw)
                .unwrap_or_else(|| {
                    warn!(raw = %raw, "Unparseable order date, using raw value");
                    raw.clone()
                }),
        ),
        OrderDate::Unknown => None,
    }
}

fn parse_order_timestamp(raw: &str) -> Option<String> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.format(ORDER_DATE_FORMAT).to_string());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.format(ORDER_DATE_FORMAT).to_string())
}

/// Where order details for a reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderInfoSource {
    Store,
    OrdersApi,
    Fallback,
}

/// Order details substituted into the welcome message
#[derive(Debug, Clone, PartialEq)]
pub struct OrderInfo {
    pub order_id: String,
    pub order_date: OrderDate,
    pub article: Option<String>,
    pub source: OrderInfoSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Sent,
    AlreadyProcessed,
    Failed,
}

impl ReplyOutcome {
    pub fn metric_label(&self) -> &'static str {
        match self {
            ReplyOutcome::Sent => "sent",
            ReplyOutcome::AlreadyProcessed => "already_processed",
            ReplyOutcome::Failed => "failed",
        }
    }
}

pub struct ReplyDispatcher {
    processed_chats: HashSet<String>,
    localization: Arc<LocalizationManager>,
    language: String,
}

impl ReplyDispatcher {
    pub fn new(localization: Arc<LocalizationManager>, language: &str) -> Self {
        let language = localization.resolve_language(language);
        Self {
            processed_chats: HashSet::new(),
            localization,
            language,
        }
    }

    pub fn is_processed(&self, chat_id: &str) -> bool {
        self.processed_chats.contains(chat_id)
    }

    pub fn processed_count(&self) -> usize {
        self.processed_chats.len()
    }

    /// Send the welcome message unless the chat already got one.
    ///
    /// `matched_order` is the stored order id the RID was matched to, if any.
    pub async fn maybe_reply(
        &mut self,
        deps: &Collaborators,
        chat_id: &str,
        rid: &str,
        matched_order: Option<&str>,
        client_name: &str,
        event: &ChatEvent,
    ) -> ReplyOutcome {
        if self.is_processed(chat_id) {
            debug!(chat_id = %chat_id, "Chat already answered, skipping welcome reply");
            return self.finish(ReplyOutcome::AlreadyProcessed);
        }

        info!(chat_id = %chat_id, rid = %rid, client = %client_name, "Sending welcome reply");

        let order_info = self.lookup_order_info(deps, rid, matched_order).await;
        let message = self.compose_welcome_message(&order_info);
        let reply_sign = self.reply_sign(deps, chat_id, event).await;

        match deps
            .chat
            .send_message(chat_id, message.trim(), reply_sign.as_deref())
            .await
        {
            Ok(()) => {
                self.processed_chats.insert(chat_id.to_string());
                info!(chat_id = %chat_id, order_id = %order_info.order_id, "Welcome reply sent");
                self.finish(ReplyOutcome::Sent)
            }
            Err(e) => {
                error_logging::log_chat_error(&e, "send_welcome_reply", chat_id, Some(rid));
                self.finish(ReplyOutcome::Failed)
            }
        }
    }

    fn finish(&self, outcome: ReplyOutcome) -> ReplyOutcome {
        crate::observability::record_reply(outcome);
        outcome
    }

    /// Order details for a RID: store by matched id, store by raw RID, new
    /// orders listing, then a fallback record.
    pub async fn lookup_order_info(
        &self,
        deps: &Collaborators,
        rid: &str,
        matched_order: Option<&str>,
    ) -> OrderInfo {
        let folder_id = matched_order.unwrap_or(rid);
        debug!(rid = %rid, folder_id = %folder_id, "Looking up order details");

        let mut store_keys = vec![folder_id];
        if folder_id != rid {
            store_keys.push(rid);
        }
        for key in store_keys {
            if let Ok(Some(task)) = deps.store.find_by_rid(key).await {
                debug!(order_id = %key, "Order details found in store");
                return OrderInfo {
                    order_id: key.to_string(),
                    order_date: OrderDate::from_raw(task.created_at.as_deref()),
                    article: task.article,
                    source: OrderInfoSource::Store,
                };
            }
        }

        match deps.orders.list_new_orders().await {
            Ok(orders) => {
                if let Some(order) = orders
                    .into_iter()
                    .find(|order| order.id == rid || order.id == folder_id)
                {
                    debug!(order_id = %order.id, "Order details found in new orders");
                    return OrderInfo {
                        order_id: order.id,
                        order_date: OrderDate::from_raw(order.created_at.as_deref()),
                        article: order.article,
                        source: OrderInfoSource::OrdersApi,
                    };
                }
            }
            Err(e) => {
                error_logging::log_network_error(&e, "order_info_lookup", None, None);
            }
        }

        warn!(order_id = %folder_id, "Order not found in store or API, using basic details");
        OrderInfo {
            order_id: folder_id.to_string(),
            order_date: OrderDate::Unknown,
            article: None,
            source: OrderInfoSource::Fallback,
        }
    }

    /// Render the welcome message for an order
    pub fn compose_welcome_message(&self, info: &OrderInfo) -> String {
        let date = format_order_date(&info.order_date).unwrap_or_else(|| {
            self.localization
                .get_message_in_language("order-date-unknown", &self.language, None)
        });
        let article = info
            .article
            .clone()
            .filter(|article| !article.is_empty())
            .unwrap_or_else(|| {
                self.localization
                    .get_message_in_language("value-unknown", &self.language, None)
            });

        self.localization.get_message_with_args_in_language(
            "welcome-message",
            &self.language,
            &[
                ("order_id", info.order_id.as_str()),
                ("order_date", date.as_str()),
                ("article", article.as_str()),
            ],
        )
    }

    /// Reply token from the event, else from the chat list
    async fn reply_sign(
        &self,
        deps: &Collaborators,
        chat_id: &str,
        event: &ChatEvent,
    ) -> Option<String> {
        if let Some(sign) = event.reply_sign.as_deref().filter(|sign| !sign.is_empty()) {
            return Some(sign.to_string());
        }

        warn!(chat_id = %chat_id, "Event carries no reply sign, looking it up in the chat list");
        match deps.chat.list_chats().await {
            Ok(chats) => chats
                .into_iter()
                .find(|chat| chat.chat_id == chat_id)
                .and_then(|chat| chat.reply_sign)
                .filter(|sign| !sign.is_empty()),
            Err(e) => {
                error_logging::log_chat_error(&e, "reply_sign_lookup", chat_id, None);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> ReplyDispatcher {
        let localization = crate::localization::create_localization_manager().unwrap();
        ReplyDispatcher::new(localization, "ru")
    }

    #[test]
    fn test_format_order_date_variants() {
        let cases = [
            ("2024-01-15T10:30:00Z", "15.01.2024 10:30"),
            ("2024-01-15T10:30:00.123456Z", "15.01.2024 10:30"),
            ("2024-01-15T10:30:00+03:00", "15.01.2024 10:30"),
            ("2024-01-15T23:05:59.5-05:00", "15.01.2024 23:05"),
            ("2024-01-15T10:30:00", "15.01.2024 10:30"),
            ("2024-01-15 10:30:00", "15.01.2024 10:30"),
        ];
        for (raw, expected) in cases {
            assert_eq!(
                format_order_date(&OrderDate::Raw(raw.to_string())).as_deref(),
                Some(expected),
                "input {raw}"
            );
        }
    }

    #[test]
    fn test_format_order_date_fallbacks() {
        assert_eq!(
            format_order_date(&OrderDate::Raw("вчера".to_string())).as_deref(),
            Some("вчера")
        );
        assert_eq!(format_order_date(&OrderDate::Unknown), None);
        assert_eq!(OrderDate::from_raw(Some("  ")), OrderDate::Unknown);
        assert_eq!(OrderDate::from_raw(None), OrderDate::Unknown);
    }

    #[test]
    fn test_format_structured_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2023-12-31T21:00:00+03:00").unwrap();
        assert_eq!(
            format_order_date(&OrderDate::Timestamp(ts)).as_deref(),
            Some("31.12.2023 21:00")
        );
    }

    #[test]
    fn test_compose_welcome_message() {
        let dispatcher = dispatcher();
        let message = dispatcher.compose_welcome_message(&OrderInfo {
            order_id: "5632423".to_string(),
            order_date: OrderDate::Raw("2024-01-15T10:30:00Z".to_string()),
            article: Some("ART-1".to_string()),
            source: OrderInfoSource::Store,
        });
        assert!(message.contains("Ваш номер заказа 5632423 от 15.01.2024 10:30, артикул - ART-1"));
        assert!(message.contains("Команда Modern Mercantile!"));
    }

    #[test]
    fn test_compose_welcome_message_placeholders() {
        let dispatcher = dispatcher();
        let message = dispatcher.compose_welcome_message(&OrderInfo {
            order_id: "a.b.c".to_string(),
            order_date: OrderDate::Unknown,
            article: None,
            source: OrderInfoSource::Fallback,
        });
        assert!(message.contains("a.b.c от недавно, артикул - неизвестно"));
    }
}
