//! Wire types for the marketplace order API and the buyer chat API.
//!
//! Every field defaults when absent or null so that partially populated
//! events never fail to decode; the reconciliation logic treats missing data
//! as "no signal" rather than as an error. Lists are decoded item by item and
//! an item that still does not fit is logged and dropped, so one malformed
//! event or order never takes the rest of its page down.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::warn;

/// Sender tag of events written by the buyer
pub const SENDER_CLIENT: &str = "client";

/// Event type tag of chat messages
pub const EVENT_TYPE_MESSAGE: &str = "message";

/// Display name used when the event carries none
pub const DEFAULT_CLIENT_NAME: &str = "Клиент";

/// One unit of chat-transport activity
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatEvent {
    #[serde(rename = "eventID", default, deserialize_with = "null_as_default")]
    pub event_id: String,
    #[serde(rename = "addTimestamp", default, deserialize_with = "null_as_default")]
    pub timestamp: i64,
    #[serde(rename = "eventType", default, deserialize_with = "null_as_default")]
    pub event_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender: String,
    #[serde(rename = "chatID", default, deserialize_with = "null_as_default")]
    pub chat_id: String,
    #[serde(rename = "clientName", default)]
    pub client_name: Option<String>,
    #[serde(rename = "addTime", default)]
    pub add_time: Option<String>,
    #[serde(rename = "replySign", default)]
    pub reply_sign: Option<String>,
    #[serde(default)]
    pub message: Option<ChatMessage>,
}

/// Message payload of a chat event
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Option<Attachments>,
}

/// Structured attachments of a chat message
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Attachments {
    #[serde(rename = "goodCard", default)]
    pub good_card: Option<GoodCard>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub images: Vec<ImageAttachment>,
}

/// Catalog card attached when the buyer opens the chat from an order page
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GoodCard {
    #[serde(default)]
    pub rid: Option<String>,
    #[serde(rename = "nmID", default)]
    pub nm_id: Option<i64>,
}

/// Image descriptor with a fetchable URL
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageAttachment {
    #[serde(default)]
    pub url: Option<String>,
}

impl ChatEvent {
    /// Message text, empty when absent
    pub fn text(&self) -> &str {
        self.message
            .as_ref()
            .and_then(|message| message.text.as_deref())
            .unwrap_or("")
    }

    /// Non-empty `goodCard.rid` of this event
    pub fn good_card_rid(&self) -> Option<&str> {
        self.good_card()
            .and_then(|card| card.rid.as_deref())
            .filter(|rid| !rid.is_empty())
    }

    /// `goodCard` attachment of this event
    pub fn good_card(&self) -> Option<&GoodCard> {
        self.message
            .as_ref()
            .and_then(|message| message.attachments.as_ref())
            .and_then(|attachments| attachments.good_card.as_ref())
    }

    /// Image attachments, empty when absent
    pub fn images(&self) -> &[ImageAttachment] {
        self.message
            .as_ref()
            .and_then(|message| message.attachments.as_ref())
            .map(|attachments| attachments.images.as_slice())
            .unwrap_or(&[])
    }

    /// Display name of the buyer
    pub fn client_name(&self) -> &str {
        self.client_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_CLIENT_NAME)
    }

    pub fn is_message(&self) -> bool {
        self.event_type == EVENT_TYPE_MESSAGE
    }

    pub fn is_from_client(&self) -> bool {
        self.sender == SENDER_CLIENT
    }
}

/// One page of chat events
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventsPage {
    #[serde(default)]
    pub next: Option<i64>,
    #[serde(rename = "totalEvents", default)]
    pub total_events: Option<u64>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub events: Vec<ChatEvent>,
}

/// Envelope of `GET /events`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub result: EventsPage,
}

/// Entry of the seller chat list
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatSummary {
    #[serde(rename = "chatID", default, deserialize_with = "null_as_default")]
    pub chat_id: String,
    #[serde(rename = "replySign", default)]
    pub reply_sign: Option<String>,
    #[serde(rename = "clientName", default)]
    pub client_name: Option<String>,
}

/// Envelope of `GET /chats`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatsResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    pub result: Vec<ChatSummary>,
}

/// New assembly task as listed by the marketplace API
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewOrder {
    /// Empty when the marketplace sent no usable id; such orders are skipped
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "orderUid", default)]
    pub order_uid: Option<String>,
    #[serde(default)]
    pub article: Option<String>,
    #[serde(rename = "nmId", default)]
    pub nm_id: Option<i64>,
    /// Price in minor currency units
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

/// Envelope of `GET /orders/new`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewOrdersResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    pub orders: Vec<NewOrder>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => Ok(value),
        serde_json::Value::Number(value) => Ok(value.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Read `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a JSON list item by item, dropping items that do not fit `T`.
///
/// `null` or a non-list value yields an empty list.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => return Ok(Vec::new()),
        other => {
            warn!(value = %other, "Expected a list in API response, using an empty one");
            return Ok(Vec::new());
        }
    };

    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed item in API response");
                None
            }
        })
        .collect();

    if decoded.len() < total {
        warn!(total, kept = decoded.len(), "Some response items were dropped");
    }
    Ok(decoded)
}
