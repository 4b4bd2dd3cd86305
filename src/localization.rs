use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use unic_langid::LanguageIdentifier;

use crate::errors::{AppError, AppResult};

/// Language used when the configured one is not available
pub const DEFAULT_LANGUAGE: &str = "ru";

/// Bundled Fluent resources, one per supported language
const RESOURCES: &[(&str, &str)] = &[
    ("ru", include_str!("../locales/ru/main.ftl")),
    ("en", include_str!("../locales/en/main.ftl")),
];

/// Localization manager for buyer-facing messages
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with all bundled languages
    pub fn new() -> AppResult<Self> {
        let mut bundles = HashMap::new();

        for (locale_str, source) in RESOURCES {
            let locale: LanguageIdentifier = locale_str
                .parse()
                .map_err(|e| AppError::Config(format!("invalid locale '{}': {}", locale_str, e)))?;
            let bundle = Self::create_bundle(&locale, source)?;
            bundles.insert(locale_str.to_string(), bundle);
        }

        Ok(Self { bundles })
    }

    fn create_bundle(
        locale: &LanguageIdentifier,
        source: &str,
    ) -> AppResult<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Replies are plain chat text, no bidi isolation marks
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string()).map_err(|(_, errors)| {
            AppError::Config(format!(
                "failed to parse {} messages: {:?}",
                locale, errors
            ))
        })?;
        bundle.add_resource(resource).map_err(|errors| {
            AppError::Config(format!(
                "duplicate {} message ids: {:?}",
                locale, errors
            ))
        })?;

        Ok(bundle)
    }

    /// Get a localized message in a specific language
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match bundle.get_message(key).and_then(|msg| msg.value()) {
            Some(pattern) => pattern,
            None => return format!("Missing translation: {}", key),
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            fluent_args
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            warn!(key = %key, language = %language, errors = ?errors, "Message formatted with errors");
        }
        value.into_owned()
    }

    /// Get a localized message with arguments in a specific language
    pub fn get_message_with_args_in_language(
        &self,
        key: &str,
        language: &str,
        args: &[(&str, &str)],
    ) -> String {
        let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
        self.get_message_in_language(key, language, Some(&args_map))
    }

    /// Check if a language is supported
    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Map a language code such as `en-US` to a supported language
    pub fn resolve_language(&self, language_code: &str) -> String {
        let lang = language_code
            .split(['-', '_'])
            .next()
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_ascii_lowercase();

        if self.is_language_supported(&lang) {
            lang
        } else {
            DEFAULT_LANGUAGE.to_string()
        }
    }
}

/// Create the shared localization manager
pub fn create_localization_manager() -> AppResult<Arc<LocalizationManager>> {
    Ok(Arc::new(LocalizationManager::new()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_language() {
        let manager = LocalizationManager::new().unwrap();
        assert_eq!(manager.resolve_language("ru"), "ru");
        assert_eq!(manager.resolve_language("en-US"), "en");
        assert_eq!(manager.resolve_language("de"), "ru");
    }

    #[test]
    fn test_missing_key() {
        let manager = LocalizationManager::new().unwrap();
        assert_eq!(
            manager.get_message_in_language("no-such-key", "ru", None),
            "Missing translation: no-such-key"
        );
    }

    #[test]
    fn test_unknown_language_falls_back_to_default() {
        let manager = LocalizationManager::new().unwrap();
        assert_eq!(
            manager.get_message_in_language("order-date-unknown", "fr", None),
            "недавно"
        );
    }
}
