//! # Localization Tests
//!
//! Message retrieval and formatting for the reply templates, including
//! language fallback and missing keys.

use wb_autobot::localization::{create_localization_manager, LocalizationManager};
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> Arc<LocalizationManager> {
        create_localization_manager().expect("Failed to create localization manager")
    }

    #[test]
    fn test_placeholders_per_language() {
        let manager = setup_localization();

        assert_eq!(manager.get_message_in_language("order-date-unknown", "ru", None), "недавно");
        assert_eq!(manager.get_message_in_language("order-date-unknown", "en", None), "recently");
        assert_eq!(manager.get_message_in_language("value-unknown", "ru", None), "неизвестно");
        assert_eq!(manager.get_message_in_language("value-unknown", "en", None), "unknown");
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_unsupported_language_falls_back_to_russian() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("value-unknown", "unsupported", None);
        assert_eq!(message, "неизвестно");
    }

    #[test]
    fn test_welcome_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("order_id", "5632423");
        args.insert("order_date", "15.01.2024 10:30");
        args.insert("article", "ART-1");

        let message = manager.get_message_in_language("welcome-message", "ru", Some(&args));
        assert!(message.starts_with("Поздравляем с успешным оформлением заказа!"));
        assert!(message.contains("Ваш номер заказа 5632423 от 15.01.2024 10:30, артикул - ART-1"));
        // No bidi isolation marks around substituted values
        assert!(!message.contains('\u{2068}'));
    }

    #[test]
    fn test_welcome_message_slice_args() {
        let manager = setup_localization();

        let message = manager.get_message_with_args_in_language(
            "welcome-message",
            "en",
            &[("order_id", "42"), ("order_date", "recently"), ("article", "unknown")],
        );
        assert!(message.contains("Your order number 42 from recently, article unknown"));
        assert_ne!(
            message,
            manager.get_message_with_args_in_language(
                "welcome-message",
                "ru",
                &[("order_id", "42"), ("order_date", "недавно"), ("article", "неизвестно")],
            )
        );
    }

    #[test]
    fn test_welcome_message_missing_args() {
        let manager = setup_localization();

        // Missing variables are reported by Fluent and rendered as placeholders
        let message = manager.get_message_in_language("welcome-message", "ru", None);
        assert!(!message.is_empty());
    }

    #[test]
    fn test_language_resolution() {
        let manager = setup_localization();

        assert!(manager.is_language_supported("ru"));
        assert!(manager.is_language_supported("en"));
        assert!(!manager.is_language_supported("fr"));

        assert_eq!(manager.resolve_language("en"), "en");
        assert_eq!(manager.resolve_language("en-US"), "en");
        assert_eq!(manager.resolve_language("RU_ru"), "ru");
        assert_eq!(manager.resolve_language("fr"), "ru");
        assert_eq!(manager.resolve_language(""), "ru");
    }
}
