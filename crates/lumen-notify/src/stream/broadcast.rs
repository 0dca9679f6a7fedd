//! Per-class broadcast stream, chunked by the membership-filter limit.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use lumen_core::traits::clock::Clock;
use lumen_core::traits::document_store::DocumentStore;
use lumen_core::types::document::Document;
use lumen_core::types::id::{ClassId, NotificationId, UserId};
use lumen_core::types::query::Query;

use crate::model::{BroadcastRecord, Notification};
use crate::state::FeedEvent;

use super::forward_snapshots;

/// Split class ids into batches of at most `batch_size`. Duplicates are
/// dropped; first-seen order is kept.
pub fn partition_classes(classes: &[ClassId], batch_size: usize) -> Vec<Vec<ClassId>> {
    let mut seen = HashSet::with_capacity(classes.len());
    let unique: Vec<ClassId> = classes
        .iter()
        .filter(|c| !c.is_empty() && seen.insert((*c).clone()))
        .cloned()
        .collect();
    unique
        .chunks(batch_size.max(1))
        .map(<[ClassId]>::to_vec)
        .collect()
}

/// Live query for one batch of classes, excluding expired announcements.
pub fn batch_query(collection: &str, batch: &[ClassId], now: DateTime<Utc>) -> Query {
    Query::collection(collection)
        .where_in("classId", batch.iter().map(|c| c.as_str().to_string()))
        .where_gt("expiresAt", now)
}

/// Decode a snapshot for `viewer`. Malformed rows are skipped.
pub fn decode_snapshot(docs: &[Document], viewer: &UserId) -> Vec<Notification> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<BroadcastRecord>() {
            Ok(record) => Some(record.into_notification(NotificationId::new(doc.id.as_str()), viewer)),
            Err(e) => {
                warn!(doc_id = %doc.id, "Skipping broadcast notification: {}", e);
                None
            }
        })
        .collect()
}

/// Latest snapshot of every batch of the current class-list generation.
#[derive(Debug, Clone, Default)]
pub struct BroadcastChunks {
    generation: u64,
    slots: Vec<Vec<Notification>>,
}

impl BroadcastChunks {
    /// Start a new generation with `chunks` empty slots.
    pub fn reset(&mut self, generation: u64, chunks: usize) {
        self.generation = generation;
        self.slots = vec![Vec::new(); chunks];
    }

    /// Replace one batch's snapshot. Returns `false` and ignores the data if
    /// it belongs to another generation or an unknown slot.
    pub fn replace(&mut self, generation: u64, index: usize, items: Vec<Notification>) -> bool {
        if generation != self.generation {
            return false;
        }
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = items;
                true
            }
            None => false,
        }
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of batches in the current generation.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the generation has no batches.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Union of all batches, deduplicated by id keeping the last-seen copy.
    pub fn union(&self) -> Vec<Notification> {
        let mut out: Vec<Notification> = Vec::new();
        let mut positions = std::collections::HashMap::new();
        for item in self.slots.iter().flatten() {
            match positions.get(&item.id) {
                Some(&pos) => out[pos] = item.clone(),
                None => {
                    positions.insert(item.id.clone(), out.len());
                    out.push(item.clone());
                }
            }
        }
        out
    }
}

/// Everything the broadcast manager needs to open batch subscriptions.
#[derive(Debug, Clone)]
pub(crate) struct BroadcastSource {
    pub store: Arc<dyn DocumentStore>,
    pub clock: Arc<dyn Clock>,
    pub viewer: UserId,
    pub collection: String,
    pub batch_size: usize,
}

/// Keep one live subscription per class batch, reopening all of them
/// whenever the class list changes. Waits until a class list is known.
pub(crate) async fn run_manager(
    source: BroadcastSource,
    mut classes: watch::Receiver<Option<Vec<ClassId>>>,
    events: mpsc::UnboundedSender<FeedEvent>,
    token: CancellationToken,
) {
    let mut generation = 0u64;

    loop {
        let current = classes.borrow_and_update().clone();

        if let Some(class_ids) = current {
            generation += 1;
            let batch_token = token.child_token();
            let pumps = open_generation(&source, &class_ids, generation, &events, &batch_token).await;

            let stop = tokio::select! {
                biased;
                _ = token.cancelled() => true,
                changed = classes.changed() => changed.is_err(),
            };

            batch_token.cancel();
            for pump in pumps {
                let _ = pump.await;
            }
            if stop {
                break;
            }
        } else {
            let stop = tokio::select! {
                biased;
                _ = token.cancelled() => true,
                changed = classes.changed() => changed.is_err(),
            };
            if stop {
                break;
            }
        }
    }

    debug!(user_id = %source.viewer, "Broadcast manager stopped");
}

async fn open_generation(
    source: &BroadcastSource,
    class_ids: &[ClassId],
    generation: u64,
    events: &mpsc::UnboundedSender<FeedEvent>,
    token: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let batches = partition_classes(class_ids, source.batch_size);
    debug!(
        user_id = %source.viewer,
        generation,
        classes = class_ids.len(),
        batches = batches.len(),
        "Opening broadcast subscriptions"
    );

    if events
        .send(FeedEvent::BroadcastReset {
            generation,
            chunks: batches.len(),
        })
        .is_err()
    {
        return Vec::new();
    }

    let now = source.clock.now();
    let mut pumps = Vec::with_capacity(batches.len());

    for (index, batch) in batches.into_iter().enumerate() {
        let query = batch_query(&source.collection, &batch, now);
        let subscription = match source.store.subscribe(query).await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!(chunk = index, generation, "Failed to open broadcast subscription: {}", e);
                continue;
            }
        };

        let events = events.clone();
        let viewer = source.viewer.clone();
        pumps.push(tokio::spawn(forward_snapshots(
            subscription,
            "broadcast",
            token.clone(),
            move |docs| {
                events
                    .send(FeedEvent::BroadcastChunk {
                        generation,
                        index,
                        items: decode_snapshot(&docs, &viewer),
                    })
                    .is_ok()
            },
        )));
    }

    pumps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeepLink, NotificationSource, NotificationType, Urgency};

    fn classes(n: usize) -> Vec<ClassId> {
        (0..n).map(|i| ClassId::new(format!("class-{i}"))).collect()
    }

    fn item(id: &str, title: &str) -> Notification {
        Notification {
            id: NotificationId::new(id),
            title: title.to_string(),
            summary: String::new(),
            kind: NotificationType::System,
            urgency: Urgency::Medium,
            timestamp: Utc::now(),
            read: false,
            deep_link: DeepLink::default(),
            user_id: UserId::new("viewer"),
            group_count: None,
            actor_name: None,
            source: NotificationSource::Broadcast,
        }
    }

    #[test]
    fn test_partition_23_classes() {
        let batches = partition_classes(&classes(23), 10);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
    }

    #[test]
    fn test_partition_drops_duplicates_and_empty() {
        let mut ids = classes(3);
        ids.push(ClassId::new("class-1"));
        ids.push(ClassId::new(""));
        let batches = partition_classes(&ids, 10);
        assert_eq!(batches, vec![classes(3)]);
        assert!(partition_classes(&[], 10).is_empty());
    }

    #[test]
    fn test_union_deduplicates_across_batches() {
        let mut chunks = BroadcastChunks::default();
        chunks.reset(1, 2);
        assert!(chunks.replace(1, 0, vec![item("a", "old"), item("b", "b")]));
        assert!(chunks.replace(1, 1, vec![item("a", "new")]));

        let union = chunks.union();
        assert_eq!(union.len(), 2);
        assert_eq!(union[0].title, "new");
    }

    #[test]
    fn test_stale_generation_ignored() {
        let mut chunks = BroadcastChunks::default();
        chunks.reset(1, 1);
        chunks.reset(2, 1);
        assert!(!chunks.replace(1, 0, vec![item("a", "a")]));
        assert!(!chunks.replace(2, 5, vec![item("a", "a")]));
        assert!(chunks.union().is_empty());
    }

    #[test]
    fn test_decode_fixes_urgency_and_read() {
        let doc = Document::new(
            "b1",
            serde_json::json!({
                "classId": "class-1",
                "title": "Field trip",
                "type": "system",
                "urgency": "high",
                "read": true,
                "createdAt": "2026-10-18T08:00:00Z",
                "expiresAt": "2026-10-25T08:00:00Z"
            }),
        );
        let items = decode_snapshot(&[doc], &UserId::new("viewer"));
        assert_eq!(items[0].urgency, Urgency::Medium);
        assert!(!items[0].read);
        assert_eq!(items[0].user_id.as_str(), "viewer");
        assert_eq!(items[0].source, NotificationSource::Broadcast);
    }
}
