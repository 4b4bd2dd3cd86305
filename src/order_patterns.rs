//! # Order Token Patterns
//!
//! Free-text extraction of order identifiers from chat messages. Clients
//! rarely attach structured order metadata after the first message of a
//! conversation, so later messages are scanned for something that looks like
//! an order or assembly-task number.
//!
//! Patterns are tried in a fixed priority order and the first capture group of
//! the first matching pattern wins:
//!
//! 1. `заказ: <CODE>` (labeled order)
//! 2. `сборочное: <CODE>` (labeled assembly task)
//! 3. bare two/three-letter prefixed codes such as `AB1234567`
//! 4. `номер: <CODE>` (labeled number)
//! 5. `order: <CODE>`
//! 6. vendor dotted-hex form `DAy.<32 hex>`
//! 7. UUID-shaped strings

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

/// Source patterns in priority order. Every pattern has exactly one capture group.
pub const ORDER_TOKEN_PATTERNS: &[&str] = &[
    r"(?i)заказ[:\s]*([A-Z0-9]{10,})",
    r"(?i)сборочное[:\s]*([A-Z0-9]{10,})",
    r"(?i)\b([A-Z]{2,3}\d{7,9})\b",
    r"(?i)номер[:\s]*([A-Z0-9]{10,})",
    r"(?i)order[:\s]*([A-Z0-9]{10,})",
    r"(?i)DAy\.([a-f0-9]{32})",
    r"(?i)([a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12})",
];

lazy_static! {
    static ref COMPILED_PATTERNS: Vec<Regex> = ORDER_TOKEN_PATTERNS
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect();
}

/// Extract the first order-like token from free-form message text.
///
/// Returns `None` for empty input or when no pattern matches.
///
/// ```
/// use wb_autobot::order_patterns::extract_order_token;
///
/// assert_eq!(extract_order_token("заказ: AB12345678").as_deref(), Some("AB12345678"));
/// assert_eq!(extract_order_token(""), None);
/// ```
pub fn extract_order_token(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    for pattern in COMPILED_PATTERNS.iter() {
        if let Some(found) = pattern.captures(text).and_then(|caps| caps.get(1)) {
            debug!(token = %found.as_str(), pattern = %pattern.as_str(), "Order token found in message text");
            return Some(found.as_str().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(COMPILED_PATTERNS.len(), ORDER_TOKEN_PATTERNS.len());
    }

    #[test]
    fn test_labeled_order_russian() {
        assert_eq!(
            extract_order_token("заказ: AB12345678").as_deref(),
            Some("AB12345678")
        );
        assert_eq!(
            extract_order_token("Мой ЗАКАЗ 1234567890123").as_deref(),
            Some("1234567890123")
        );
    }

    #[test]
    fn test_labeled_assembly_task() {
        assert_eq!(
            extract_order_token("сборочное: 9988776655").as_deref(),
            Some("9988776655")
        );
    }

    #[test]
    fn test_bare_prefixed_code() {
        assert_eq!(
            extract_order_token("посмотрите WB12345678 пожалуйста").as_deref(),
            Some("WB12345678")
        );
    }

    #[test]
    fn test_labeled_number_and_english_order() {
        assert_eq!(
            extract_order_token("номер 55554444333").as_deref(),
            Some("55554444333")
        );
        assert_eq!(
            extract_order_token("my order: 1122334455").as_deref(),
            Some("1122334455")
        );
    }

    #[test]
    fn test_vendor_dotted_hex() {
        let hex = "0123456789abcdef0123456789abcdef";
        assert_eq!(
            extract_order_token(&format!("ref DAy.{hex} end")).as_deref(),
            Some(hex)
        );
    }

    #[test]
    fn test_uuid() {
        let uuid = "123e4567-e89b-12d3-a456-426614174000";
        assert_eq!(
            extract_order_token(&format!("id {uuid}")).as_deref(),
            Some(uuid)
        );
    }

    #[test]
    fn test_priority_labeled_before_bare() {
        // Both the labeled form and the bare code are present; the labeled pattern is first.
        assert_eq!(
            extract_order_token("AB1234567 заказ: 1111111111").as_deref(),
            Some("1111111111")
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(extract_order_token(""), None);
        assert_eq!(extract_order_token("Здравствуйте, когда доставка?"), None);
        assert_eq!(extract_order_token("заказ: 123"), None);
        assert_eq!(extract_order_token("🙂🙂🙂"), None);
    }
}
