//! Remote path naming helpers
//!
//! Folder and file names on the remote disk are built from data supplied by
//! buyers and by the marketplace (display names, chat ids, RIDs). Everything
//! that becomes a path segment passes through here so that a value can never
//! introduce extra path levels or characters the disk rejects.
//!
//! ## Usage Examples
//!
//! ```rust
//! use wb_autobot::path_validation::{sanitize_folder_name, media_file_name};
//!
//! assert_eq!(sanitize_folder_name(" Анна: <VIP> "), "Анна_ _VIP_");
//! assert_eq!(
//!     media_file_name(Some("Анна"), 1700000000000, 0, "https://cdn/x.PNG"),
//!     "Анна_1700000000000_1.png"
//! );
//! ```

/// Characters replaced with `_` in folder names
pub const FORBIDDEN_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum length of a sanitized folder name, in characters
pub const MAX_FOLDER_NAME_CHARS: usize = 50;

/// Number of trailing chat id characters used in per-chat folder names
pub const CHAT_ID_SUFFIX_CHARS: usize = 8;

/// Extensions kept from attachment URLs; anything else is stored as `jpg`
pub const MEDIA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

const DEFAULT_MEDIA_EXTENSION: &str = "jpg";

/// Sanitize a display value for use as a folder name.
///
/// Forbidden characters become `_`, spaces and dots are trimmed from both
/// ends, and the result is cut to [`MAX_FOLDER_NAME_CHARS`] characters.
pub fn sanitize_folder_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if FORBIDDEN_NAME_CHARS.contains(&c) { '_' } else { c })
        .collect();
    replaced
        .trim_matches(|c| c == ' ' || c == '.')
        .chars()
        .take(MAX_FOLDER_NAME_CHARS)
        .collect()
}

/// Make an identifier safe as a single path segment without otherwise changing it
pub fn path_segment(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| if FORBIDDEN_NAME_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    match replaced.as_str() {
        "" | "." | ".." => "_".repeat(replaced.len().max(1)),
        _ => replaced,
    }
}

/// Per-chat folder name: `<sanitized client>_<last 8 chars of sanitized chat id>`
pub fn chat_folder_name(client_name: &str, chat_id: &str) -> String {
    let clean_chat: Vec<char> = sanitize_folder_name(chat_id).chars().collect();
    let suffix: String = clean_chat[clean_chat.len().saturating_sub(CHAT_ID_SUFFIX_CHARS)..]
        .iter()
        .collect();
    format!("{}_{}", sanitize_folder_name(client_name), suffix)
}

/// Join a root folder and a child segment
pub fn join_remote_path(root: &str, child: &str) -> String {
    format!("{}/{}", root.trim_end_matches('/'), child)
}

/// File extension taken from the attachment URL
pub fn media_extension(url: &str) -> &'static str {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let last_segment = without_query.rsplit('/').next().unwrap_or(without_query);

    last_segment
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .and_then(|ext| MEDIA_EXTENSIONS.iter().find(|known| **known == ext).copied())
        .unwrap_or(DEFAULT_MEDIA_EXTENSION)
}

/// File name for the `index`-th (0-based) attachment of a message.
///
/// The millisecond timestamp keeps names unique across reprocessing of the
/// same event.
pub fn media_file_name(client_name: Option<&str>, timestamp_ms: i64, index: usize, url: &str) -> String {
    let prefix = client_name
        .map(sanitize_folder_name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "photo".to_string());
    format!("{}_{}_{}.{}", prefix, timestamp_ms, index + 1, media_extension(url))
}
