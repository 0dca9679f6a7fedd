//! State owned by the aggregator's event loop.
//!
//! Every source and every optimistic action reaches the loop as a
//! [`FeedEvent`]; the loop is the only writer of [`FeedState`].

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use lumen_core::types::id::NotificationId;

use crate::merger::{self, MergedFeed};
use crate::model::Notification;
use crate::stream::broadcast::BroadcastChunks;

/// An update for the event loop.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// New snapshot of the private stream.
    Private(Vec<Notification>),
    /// The class list changed; a new generation with `chunks` batches starts.
    BroadcastReset {
        /// Generation number.
        generation: u64,
        /// Number of batches.
        chunks: usize,
    },
    /// New snapshot of one broadcast batch.
    BroadcastChunk {
        /// Generation the batch belongs to.
        generation: u64,
        /// Batch index.
        index: usize,
        /// Decoded rows.
        items: Vec<Notification>,
    },
    /// New snapshot of the receipt set.
    Receipts(HashSet<NotificationId>),
    /// A private notification was marked read locally.
    PrivateMarkedRead(NotificationId),
    /// A receipt was created locally.
    ReceiptAdded(NotificationId),
    /// The write behind a local private read failed; undo it.
    PrivateReadFailed(NotificationId),
    /// The receipt write behind a local receipt failed; undo it.
    ReceiptFailed(NotificationId),
}

/// Cached slices of every source plus optimistic local changes.
#[derive(Debug, Default)]
pub struct FeedState {
    private: Vec<Notification>,
    broadcast: BroadcastChunks,
    receipts: HashSet<NotificationId>,
    pending_receipts: HashSet<NotificationId>,
    pending_private_reads: HashSet<NotificationId>,
}

impl FeedState {
    /// Apply an event. Returns `false` if it changed nothing.
    pub fn apply(&mut self, event: FeedEvent) -> bool {
        match event {
            FeedEvent::Private(items) => {
                // Local reads the stream no longer reports have landed.
                self.pending_private_reads
                    .retain(|id| items.iter().any(|n| &n.id == id));
                self.private = items;
                true
            }
            FeedEvent::BroadcastReset { generation, chunks } => {
                self.broadcast.reset(generation, chunks);
                true
            }
            FeedEvent::BroadcastChunk {
                generation,
                index,
                items,
            } => self.broadcast.replace(generation, index, items),
            FeedEvent::Receipts(ids) => {
                self.pending_receipts.retain(|id| !ids.contains(id));
                self.receipts = ids;
                true
            }
            FeedEvent::PrivateMarkedRead(id) => {
                if self.private.iter().any(|n| n.id == id) {
                    self.pending_private_reads.insert(id)
                } else {
                    false
                }
            }
            FeedEvent::ReceiptAdded(id) => {
                if self.receipts.contains(&id) {
                    false
                } else {
                    self.pending_receipts.insert(id)
                }
            }
            FeedEvent::PrivateReadFailed(id) => self.pending_private_reads.remove(&id),
            FeedEvent::ReceiptFailed(id) => self.pending_receipts.remove(&id),
        }
    }

    /// Merge the current slices.
    pub fn merged(&self, now: DateTime<Utc>, max_age: Duration) -> MergedFeed {
        let private: Vec<Notification> = self
            .private
            .iter()
            .filter(|n| !self.pending_private_reads.contains(&n.id))
            .cloned()
            .collect();

        let receipts: HashSet<NotificationId> = if self.pending_receipts.is_empty() {
            self.receipts.clone()
        } else {
            self.receipts
                .union(&self.pending_receipts)
                .cloned()
                .collect()
        };

        merger::merge(
            &private,
            &self.broadcast.union(),
            &receipts,
            now,
            max_age,
        )
    }
}
