//! Per-user private notification stream.

use std::collections::HashSet;

use tracing::warn;

use lumen_core::config::notifications::NotificationsConfig;
use lumen_core::types::document::Document;
use lumen_core::types::id::{NotificationId, UserId};
use lumen_core::types::query::{Query, SortDirection};

use crate::model::{Notification, PrivateRecord};

/// Live query for the viewer's unread private notifications, newest first.
pub fn live_query(config: &NotificationsConfig, user: &UserId) -> Query {
    Query::collection(config.collections.private.as_str())
        .where_eq("userId", user.as_str())
        .where_eq("read", false)
        .order_by("timestamp", SortDirection::Descending)
        .limit(config.feed.private_limit)
}

/// Decode a snapshot. Malformed rows are skipped; duplicate ids keep the
/// first occurrence.
pub fn decode_snapshot(docs: &[Document]) -> Vec<Notification> {
    let mut seen = HashSet::with_capacity(docs.len());
    docs.iter()
        .filter_map(|doc| match doc.decode::<PrivateRecord>() {
            Ok(record) => Some(record.into_notification(NotificationId::new(doc.id.as_str()))),
            Err(e) => {
                warn!(doc_id = %doc.id, "Skipping private notification: {}", e);
                None
            }
        })
        .filter(|n| seen.insert(n.id.clone()))
        .collect()
}
