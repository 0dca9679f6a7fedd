//! Read receipts for broadcast notifications.
//!
//! A receipt is a marker document keyed by `(user, notification)`; its
//! existence means the viewer has read that broadcast. Receipts are only
//! ever created, never deleted.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use lumen_core::result::AppResult;
use lumen_core::traits::document_store::DocumentStore;
use lumen_core::types::document::{Document, WriteBatch};
use lumen_core::types::id::{NotificationId, UserId};
use lumen_core::types::query::Query;

use crate::model::instant;

/// Stored receipt body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    /// Reader.
    pub user_id: UserId,
    /// Broadcast notification that was read.
    pub notification_id: NotificationId,
    /// When it was marked read.
    #[serde(with = "instant")]
    pub read_at: DateTime<Utc>,
}

impl ReadReceipt {
    /// Build a receipt.
    pub fn new(user_id: UserId, notification_id: NotificationId, read_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            notification_id,
            read_at,
        }
    }

    /// Deterministic document id, which makes writing a receipt idempotent.
    pub fn document_id(&self) -> String {
        document_id(&self.user_id, &self.notification_id)
    }

    /// JSON body for the store.
    pub fn to_value(&self) -> AppResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Document id of the receipt for `(user, notification)`.
///
/// Ids are opaque and may contain `_`; the byte-length prefix on the user
/// id keeps every pair distinct.
pub fn document_id(user: &UserId, notification: &NotificationId) -> String {
    format!("{}:{user}_{notification}", user.as_str().len())
}

/// Live query for all of the viewer's receipts.
pub fn live_query(collection: &str, user: &UserId) -> Query {
    Query::collection(collection).where_eq("userId", user.as_str())
}

/// Notification ids covered by a receipt snapshot. Malformed rows are skipped.
pub fn decode_snapshot(docs: &[Document]) -> HashSet<NotificationId> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<ReadReceipt>() {
            Ok(receipt) => Some(receipt.notification_id),
            Err(e) => {
                warn!(doc_id = %doc.id, "Skipping read receipt: {}", e);
                None
            }
        })
        .collect()
}

/// Create (or harmlessly re-create) a receipt.
pub async fn write(
    store: &dyn DocumentStore,
    collection: &str,
    receipt: &ReadReceipt,
) -> AppResult<()> {
    store
        .set(collection, &receipt.document_id(), receipt.to_value()?)
        .await
}

/// Queue a receipt in a batch.
pub fn stage(batch: &mut WriteBatch, collection: &str, receipt: &ReadReceipt) -> AppResult<()> {
    batch.set(collection, &receipt.document_id(), receipt.to_value()?);
    Ok(())
}
