//! RID resolution cascade
//!
//! The chat API offers no direct link between a chat and an order. The only
//! structured signal is the `goodCard` attachment, and it is present only on
//! the message that opened the chat. Later messages therefore escalate
//! through cheaper-to-costlier sources until something yields a RID:
//!
//! 1. the per-chat cache
//! 2. `goodCard.rid` of the current message
//! 3. an order token in the message text
//! 4. a `goodCard.rid` of another event of the same chat in this batch
//! 5. a `goodCard.rid` found in a fresh, unfiltered history fetch
//!
//! The first hit is cached for the chat and wins for the rest of the process
//! lifetime.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::errors::error_logging;
use crate::order_patterns::extract_order_token;
use crate::traits::ChatTransport;
use crate::wb::types::ChatEvent;

/// Where a RID was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RidSource {
    ChatCache,
    CurrentGoodCard,
    MessageText,
    CycleEvents,
    ChatHistory,
}

impl RidSource {
    /// Human-readable source name used in logs
    pub fn label(&self) -> &'static str {
        match self {
            RidSource::ChatCache => "chat cache",
            RidSource::CurrentGoodCard => "goodCard of current message",
            RidSource::MessageText => "message text",
            RidSource::CycleEvents => "events in this cycle",
            RidSource::ChatHistory => "chat history",
        }
    }

    /// Metric label value
    pub fn metric_label(&self) -> &'static str {
        match self {
            RidSource::ChatCache => "chat_cache",
            RidSource::CurrentGoodCard => "current_good_card",
            RidSource::MessageText => "message_text",
            RidSource::CycleEvents => "cycle_events",
            RidSource::ChatHistory => "chat_history",
        }
    }
}

impl std::fmt::Display for RidSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RidResolution {
    pub rid: String,
    pub source: RidSource,
}

/// Cascade state: the chat-to-RID cache
#[derive(Debug, Default)]
pub struct RidResolver {
    cache: HashMap<String, String>,
}

impl RidResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached RID of a chat
    pub fn cached(&self, chat_id: &str) -> Option<&str> {
        self.cache.get(chat_id).map(String::as_str)
    }

    pub fn cached_chats(&self) -> usize {
        self.cache.len()
    }

    /// Resolve the RID for `chat_id`.
    ///
    /// `batch` is the whole batch the current event was delivered in. A failed
    /// history fetch is logged and treated as "not found".
    pub async fn resolve(
        &mut self,
        chat_id: &str,
        event: &ChatEvent,
        batch: &[ChatEvent],
        transport: &dyn ChatTransport,
    ) -> Option<RidResolution> {
        if let Some(rid) = self.cache.get(chat_id) {
            debug!(chat_id = %chat_id, rid = %rid, "RID taken from chat cache");
            let resolution = RidResolution {
                rid: rid.clone(),
                source: RidSource::ChatCache,
            };
            crate::observability::record_rid_resolution(Some(resolution.source));
            return Some(resolution);
        }

        let found = match Self::resolve_uncached(chat_id, event, batch, transport).await {
            Some(found) => found,
            None => {
                info!(chat_id = %chat_id, "No RID found for chat");
                crate::observability::record_rid_resolution(None);
                return None;
            }
        };

        info!(
            chat_id = %chat_id,
            rid = %found.rid,
            source = %found.source,
            nm_id = ?event.good_card().and_then(|card| card.nm_id),
            "RID resolved"
        );
        self.cache.insert(chat_id.to_string(), found.rid.clone());
        crate::observability::record_rid_resolution(Some(found.source));
        Some(found)
    }

    async fn resolve_uncached(
        chat_id: &str,
        event: &ChatEvent,
        batch: &[ChatEvent],
        transport: &dyn ChatTransport,
    ) -> Option<RidResolution> {
        if let Some(rid) = event.good_card_rid() {
            return Some(RidResolution {
                rid: rid.to_string(),
                source: RidSource::CurrentGoodCard,
            });
        }

        if let Some(rid) = extract_order_token(event.text()) {
            return Some(RidResolution {
                rid,
                source: RidSource::MessageText,
            });
        }

        if let Some(rid) = find_rid_in_events(chat_id, batch) {
            return Some(RidResolution {
                rid,
                source: RidSource::CycleEvents,
            });
        }

        match transport.fetch_events(None).await {
            Ok(history) => {
                let rid = find_rid_in_events(chat_id, &history.events);
                if rid.is_none() {
                    debug!(chat_id = %chat_id, events = history.events.len(), "No RID in chat history");
                }
                rid.map(|rid| RidResolution {
                    rid,
                    source: RidSource::ChatHistory,
                })
            }
            Err(e) => {
                warn!(chat_id = %chat_id, "Chat history fetch failed, continuing without RID");
                error_logging::log_chat_error(&e, "history_rid_lookup", chat_id, None);
                None
            }
        }
    }
}

/// First `goodCard.rid` among events of the given chat, in delivery order
pub fn find_rid_in_events(chat_id: &str, events: &[ChatEvent]) -> Option<String> {
    events
        .iter()
        .filter(|event| event.chat_id == chat_id)
        .find_map(|event| event.good_card_rid())
        .map(str::to_string)
}
