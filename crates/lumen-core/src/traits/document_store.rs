//! Remote document store trait and the live subscription handle.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::result::AppResult;
use crate::types::document::{Document, WriteBatch};
use crate::types::query::Query;

/// One emission of a live query: the full current result set, or an error.
pub type Snapshot = AppResult<Vec<Document>>;

/// Trait for the backend document database.
///
/// Implementations must honour the filter contract of [`Query`]: equality,
/// greater-than, and membership with at most ten values.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch a single document. Returns `None` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>>;

    /// Run a one-shot query.
    async fn query(&self, query: &Query) -> AppResult<Vec<Document>>;

    /// Open a live query. The first snapshot is emitted as soon as the
    /// subscription is registered, then one full snapshot per change.
    async fn subscribe(&self, query: Query) -> AppResult<Subscription>;

    /// Create or replace a document.
    async fn set(&self, collection: &str, id: &str, data: serde_json::Value) -> AppResult<()>;

    /// Merge fields into an existing document. Not-found if it is missing.
    async fn update(&self, collection: &str, id: &str, patch: serde_json::Value) -> AppResult<()>;

    /// Apply every write in the batch atomically.
    async fn commit(&self, batch: WriteBatch) -> AppResult<()>;
}

/// Handle to a live query.
///
/// Snapshots arrive through [`Subscription::next_snapshot`]. Cancelling or
/// dropping the handle tells the producer to stop; no snapshot is yielded
/// after cancellation.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Snapshot>,
    token: CancellationToken,
}

impl Subscription {
    /// Wrap a snapshot receiver and the token its producer watches.
    pub fn new(receiver: mpsc::UnboundedReceiver<Snapshot>, token: CancellationToken) -> Self {
        Self { receiver, token }
    }

    /// Create a connected sender/subscription pair.
    pub fn channel() -> (mpsc::UnboundedSender<Snapshot>, CancellationToken, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        (tx, token.clone(), Self::new(rx, token))
    }

    /// Wait for the next snapshot. `None` once cancelled or the producer
    /// has gone away.
    pub async fn next_snapshot(&mut self) -> Option<Snapshot> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            snapshot = self.receiver.recv() => snapshot,
        }
    }

    /// Stop the subscription.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the subscription has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
