//! Pure merge of both streams and the receipt set into one feed.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use lumen_core::types::id::NotificationId;

use crate::model::{Notification, NotificationSource};

/// The unified feed for one viewer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedFeed {
    /// Newest first, one entry per id, `read` is the effective state.
    pub items: Vec<Notification>,
    /// Entries with effective `read == false`.
    pub unread_count: usize,
}

impl MergedFeed {
    /// Look up an entry by id.
    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.items.iter().find(|n| &n.id == id)
    }

    /// Entries not yet read.
    pub fn unread(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter().filter(|n| !n.read)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the feed is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Merge the private list, the broadcast list and the receipt set.
///
/// Private entries older than `max_age` (relative to `now`) are dropped even
/// if unread. A private entry is read if its own flag is set or a receipt
/// exists; a broadcast entry is read only if a receipt exists. Ids seen twice
/// keep the last-seen copy (broadcast wins over private). The result is
/// stably sorted newest first by instant.
pub fn merge(
    private: &[Notification],
    broadcast: &[Notification],
    receipts: &HashSet<NotificationId>,
    now: DateTime<Utc>,
    max_age: Duration,
) -> MergedFeed {
    let cutoff = now - max_age;

    let mut items: Vec<Notification> = Vec::with_capacity(private.len() + broadcast.len());
    let mut positions: HashMap<NotificationId, usize> = HashMap::new();

    let candidates = private
        .iter()
        .filter(|n| n.timestamp >= cutoff)
        .chain(broadcast.iter());

    for item in candidates {
        let mut item = item.clone();
        let has_receipt = receipts.contains(&item.id);
        item.read = match item.source {
            NotificationSource::Private => item.read || has_receipt,
            NotificationSource::Broadcast => has_receipt,
        };

        match positions.get(&item.id) {
            Some(&pos) => items[pos] = item,
            None => {
                positions.insert(item.id.clone(), items.len());
                items.push(item);
            }
        }
    }

    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let unread_count = items.iter().filter(|n| !n.read).count();

    MergedFeed {
        items,
        unread_count,
    }
}
