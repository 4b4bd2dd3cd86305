//! Media save step: buyer image attachments to the remote disk.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::bot::order_matcher::MediaTarget;
use crate::bot::Collaborators;
use crate::errors::error_logging;
use crate::path_validation::media_file_name;
use crate::wb::client::truncate_for_log;
use crate::wb::types::ChatEvent;

/// Result of saving the attachments of one event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaSaveReport {
    /// Remote paths of uploaded files
    pub saved: Vec<String>,
    /// Attachments that could not be saved
    pub failed: usize,
}

/// Download every image attachment of `event` and upload it into the target folder.
///
/// The folder is created first; if that fails nothing is downloaded. A failed
/// image is logged and the remaining images are still processed.
pub async fn save_event_media(
    deps: &Collaborators,
    event: &ChatEvent,
    target: &MediaTarget,
) -> MediaSaveReport {
    let images = event.images();
    let mut report = MediaSaveReport::default();
    if images.is_empty() {
        return report;
    }

    info!(chat_id = %event.chat_id, images = images.len(), folder = %target.path, "Saving media attachments");

    if let Err(e) = deps.storage.ensure_folder(&target.path).await {
        error_logging::log_chat_error(&e, "create_media_folder", &event.chat_id, None);
        report.failed = images.len();
        crate::observability::record_media_upload(false, 0);
        return report;
    }

    for (index, image) in images.iter().enumerate() {
        let url = match image.url.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => url,
            None => {
                warn!(chat_id = %event.chat_id, image = index + 1, "Image attachment has no URL");
                report.failed += 1;
                continue;
            }
        };
        debug!(image = index + 1, url = %truncate_for_log(url, 100), "Downloading media");

        let content = match deps.chat.download_media(url).await {
            Ok(content) => content,
            Err(e) => {
                error_logging::log_chat_error(&e, "download_media", &event.chat_id, None);
                report.failed += 1;
                crate::observability::record_media_upload(false, 0);
                continue;
            }
        };

        let size = content.len();
        let file_name = media_file_name(
            event.client_name.as_deref(),
            Utc::now().timestamp_millis(),
            index,
            url,
        );
        let path = format!("{}/{}", target.path, file_name);

        match deps.storage.upload_bytes(content, &path).await {
            Ok(()) => {
                crate::observability::record_media_upload(true, size);
                report.saved.push(path);
            }
            Err(e) => {
                error_logging::log_storage_error(&e, "upload_media", Some(&path), Some(size));
                crate::observability::record_media_upload(false, size);
                report.failed += 1;
            }
        }
    }

    info!(
        chat_id = %event.chat_id,
        saved = report.saved.len(),
        failed = report.failed,
        "Media attachments processed"
    );
    report
}
