//! The normalized notification shown in the feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lumen_core::types::id::{NotificationId, UserId};

use super::deep_link::DeepLink;
use super::instant;
use super::kind::{NotificationType, Urgency};

/// Which collection a notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSource {
    /// Per-user row with its own durable `read` flag.
    Private,
    /// Per-class announcement; read state lives in receipts.
    Broadcast,
}

/// A notification in the shape the feed exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Identifier, unique within its source collection.
    pub id: NotificationId,
    /// Headline.
    pub title: String,
    /// Short body text.
    pub summary: String,
    /// Category used for icon and styling.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Urgency.
    pub urgency: Urgency,
    /// When the event happened.
    #[serde(with = "instant")]
    pub timestamp: DateTime<Utc>,
    /// Effective read state once merged; the stored flag before that.
    pub read: bool,
    /// Navigation target.
    pub deep_link: DeepLink,
    /// Owner (private) or viewer (broadcast).
    pub user_id: UserId,
    /// Number of collapsed duplicate events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_count: Option<u32>,
    /// Display name of whoever triggered the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,
    /// Source collection.
    pub source: NotificationSource,
}

impl Notification {
    /// Timestamp in its canonical text form.
    pub fn timestamp_text(&self) -> String {
        instant::format(&self.timestamp)
    }

    /// Whether this came from the private stream.
    pub fn is_private(&self) -> bool {
        self.source == NotificationSource::Private
    }
}
