//! Stored record layouts for both notification collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lumen_core::types::id::{ClassId, NotificationId, UserId};

use super::deep_link::DeepLink;
use super::instant;
use super::kind::{NotificationType, Urgency};
use super::notification::{Notification, NotificationSource};

/// Row of the per-user private notification collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateRecord {
    /// Recipient.
    pub user_id: UserId,
    /// Headline.
    #[serde(default)]
    pub title: String,
    /// Body text.
    #[serde(default)]
    pub summary: String,
    /// Category.
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
    /// Urgency.
    #[serde(default)]
    pub urgency: Urgency,
    /// Creation instant.
    #[serde(with = "instant")]
    pub timestamp: DateTime<Utc>,
    /// Durable read flag.
    #[serde(default)]
    pub read: bool,
    /// Navigation target.
    #[serde(default)]
    pub deep_link: DeepLink,
    /// Collapsed duplicate count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_count: Option<u32>,
    /// Triggering actor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,
}

impl PrivateRecord {
    /// Normalize into the feed shape.
    pub fn into_notification(self, id: NotificationId) -> Notification {
        Notification {
            id,
            title: self.title,
            summary: self.summary,
            kind: self.kind,
            urgency: self.urgency,
            timestamp: self.timestamp,
            read: self.read,
            deep_link: self.deep_link,
            user_id: self.user_id,
            group_count: self.group_count,
            actor_name: self.actor_name,
            source: NotificationSource::Private,
        }
    }
}

/// Row of the per-class broadcast collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRecord {
    /// Target class.
    pub class_id: ClassId,
    /// Headline.
    #[serde(default)]
    pub title: String,
    /// Body text.
    #[serde(default)]
    pub summary: String,
    /// Category.
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
    /// Creation instant.
    #[serde(with = "instant")]
    pub created_at: DateTime<Utc>,
    /// After this instant the announcement is no longer delivered.
    #[serde(with = "instant")]
    pub expires_at: DateTime<Utc>,
    /// Navigation target.
    #[serde(default)]
    pub deep_link: DeepLink,
    /// Collapsed duplicate count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_count: Option<u32>,
    /// Triggering actor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,
}

impl BroadcastRecord {
    /// Normalize into the feed shape for `viewer`.
    ///
    /// Urgency is always `Medium` and `read` always `false`: read state for
    /// broadcasts comes from receipts only.
    pub fn into_notification(self, id: NotificationId, viewer: &UserId) -> Notification {
        Notification {
            id,
            title: self.title,
            summary: self.summary,
            kind: self.kind,
            urgency: Urgency::Medium,
            timestamp: self.created_at,
            read: false,
            deep_link: self.deep_link,
            user_id: viewer.clone(),
            group_count: self.group_count,
            actor_name: self.actor_name,
            source: NotificationSource::Broadcast,
        }
    }
}
