//! Composite RID to stored order matching and media folder selection.

use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::path_validation::{chat_folder_name, join_remote_path, path_segment};
use crate::traits::OrderStore;

/// Separator of composite RIDs (`<prefix>.<orderUid>.<suffix>`)
pub const RID_DELIMITER: char = '.';

/// Order uid segment of a composite RID.
///
/// Plain RIDs (no delimiter) and RIDs with an empty second segment have none.
pub fn order_uid_from_rid(rid: &str) -> Option<&str> {
    if !rid.contains(RID_DELIMITER) {
        return None;
    }
    rid.split(RID_DELIMITER)
        .nth(1)
        .filter(|segment| !segment.is_empty())
}

/// Match a RID to the primary id of a stored order.
///
/// Store failures are logged by the store and read as "no match".
pub async fn match_order(store: &dyn OrderStore, rid: &str) -> Option<String> {
    let order_uid = order_uid_from_rid(rid)?;

    match store.find_by_order_uid(order_uid).await {
        Ok(Some(task)) => {
            info!(rid = %rid, order_id = %task.rid, "Chat RID matched to stored order");
            Some(task.rid)
        }
        Ok(None) => {
            debug!(rid = %rid, order_uid = %order_uid, "No stored order for RID");
            None
        }
        Err(_) => None,
    }
}

/// Root folders of the remote layout
#[derive(Debug, Clone, PartialEq)]
pub struct FolderLayout {
    pub orders_root: String,
    pub chats_root: String,
}

impl Default for FolderLayout {
    fn default() -> Self {
        Self {
            orders_root: "WB_Orders".to_string(),
            chats_root: "WB_Chats".to_string(),
        }
    }
}

impl From<&StorageConfig> for FolderLayout {
    fn from(config: &StorageConfig) -> Self {
        Self {
            orders_root: config.orders_root.clone(),
            chats_root: config.chats_root.clone(),
        }
    }
}

impl FolderLayout {
    /// Folder of a stored order
    pub fn order_folder(&self, order_id: &str) -> String {
        join_remote_path(&self.orders_root, &path_segment(order_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// RID matched a stored order
    MatchedOrder,
    /// RID known but unmatched; folder keyed by the raw RID
    ChatRid,
    /// No RID; per-chat folder
    ChatFolder,
}

/// Remote folder for the media of one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTarget {
    pub path: String,
    pub kind: TargetKind,
}

/// Pick the media folder: matched order, else raw RID, else per-chat folder
pub fn media_target(
    layout: &FolderLayout,
    matched_order: Option<&str>,
    rid: Option<&str>,
    client_name: &str,
    chat_id: &str,
) -> MediaTarget {
    match (matched_order, rid) {
        (Some(order_id), _) => MediaTarget {
            path: layout.order_folder(order_id),
            kind: TargetKind::MatchedOrder,
        },
        (None, Some(rid)) => MediaTarget {
            path: layout.order_folder(rid),
            kind: TargetKind::ChatRid,
        },
        (None, None) => MediaTarget {
            path: join_remote_path(&layout.chats_root, &chat_folder_name(client_name, chat_id)),
            kind: TargetKind::ChatFolder,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_uid_from_rid() {
        assert_eq!(order_uid_from_rid("x.UID123.y"), Some("UID123"));
        assert_eq!(order_uid_from_rid("a.b"), Some("b"));
        assert_eq!(order_uid_from_rid("plainid"), None);
        assert_eq!(order_uid_from_rid("a..c"), None);
        assert_eq!(order_uid_from_rid("."), None);
    }

    #[test]
    fn test_media_target_priority() {
        let layout = FolderLayout::default();

        let matched = media_target(&layout, Some("ORD1"), Some("x.UID.y"), "Анна", "c1");
        assert_eq!(matched.path, "WB_Orders/ORD1");
        assert_eq!(matched.kind, TargetKind::MatchedOrder);

        let by_rid = media_target(&layout, None, Some("a.b.c"), "Анна", "c1");
        assert_eq!(by_rid.path, "WB_Orders/a.b.c");
        assert_eq!(by_rid.kind, TargetKind::ChatRid);

        let by_chat = media_target(&layout, None, None, "Анна", "1:0123456789abcdef");
        assert_eq!(by_chat.path, "WB_Chats/Анна_89abcdef");
        assert_eq!(by_chat.kind, TargetKind::ChatFolder);
    }

    #[test]
    fn test_rid_cannot_escape_orders_root() {
        let target = media_target(&FolderLayout::default(), None, Some("../x"), "A", "c");
        assert_eq!(target.path, "WB_Orders/.._x");
    }
}
