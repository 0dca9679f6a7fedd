//! Notification aggregation configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;

/// Upper bound on values in a single membership (`IN`) filter.
pub const MAX_IN_FILTER_VALUES: usize = 10;

/// Longest accepted time window (feed age, cooldown, lookback): 100 years.
pub const MAX_WINDOW_HOURS: i64 = 100 * 365 * 24;

/// Notification aggregation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Merged feed bounds.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Class broadcast subscription settings.
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    /// OS alert delivery throttle.
    #[serde(default)]
    pub throttle: ThrottleConfig,
    /// Remote collection names.
    #[serde(default)]
    pub collections: CollectionsConfig,
    /// Deep-link destinations the dispatcher knows about.
    #[serde(default)]
    pub deep_links: DeepLinkConfig,
}

impl NotificationsConfig {
    /// Reject time windows outside `0..=MAX_WINDOW_HOURS`.
    pub fn validate(&self) -> AppResult<()> {
        check_window(
            "notifications.feed.max_age_days",
            self.feed.max_age_days.checked_mul(24),
        )?;
        check_window(
            "notifications.throttle.interval_hours",
            Some(self.throttle.interval_hours),
        )?;
        check_window(
            "notifications.throttle.lookback_hours",
            Some(self.throttle.lookback_hours),
        )?;
        Ok(())
    }
}

fn check_window(key: &str, hours: Option<i64>) -> AppResult<()> {
    match hours {
        Some(h) if (0..=MAX_WINDOW_HOURS).contains(&h) => Ok(()),
        _ => Err(AppError::configuration(format!(
            "'{key}' is out of range (at most {MAX_WINDOW_HOURS} hours)"
        ))),
    }
}

/// `hours` as a duration, or `fallback` hours if out of range.
fn window(hours: Option<i64>, fallback: i64) -> chrono::Duration {
    hours
        .filter(|h| (0..=MAX_WINDOW_HOURS).contains(h))
        .and_then(chrono::Duration::try_hours)
        .unwrap_or_else(|| chrono::Duration::hours(fallback))
}

/// Merged feed bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Maximum unread private notifications fetched by the live query.
    #[serde(default = "default_private_limit")]
    pub private_limit: usize,
    /// Private notifications older than this are dropped from the feed.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
}

impl FeedConfig {
    /// Feed age bound as a `chrono` duration. Out-of-range values fall back
    /// to the default.
    pub fn max_age(&self) -> chrono::Duration {
        window(
            self.max_age_days.checked_mul(24),
            default_max_age_days() * 24,
        )
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            private_limit: default_private_limit(),
            max_age_days: default_max_age_days(),
        }
    }
}

/// Class broadcast subscription settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Class ids per live query. Clamped to [`MAX_IN_FILTER_VALUES`].
    #[serde(default = "default_max_classes_per_query")]
    pub max_classes_per_query: usize,
}

impl BroadcastConfig {
    /// Effective batch size, always within `1..=MAX_IN_FILTER_VALUES`.
    pub fn batch_size(&self) -> usize {
        self.max_classes_per_query.clamp(1, MAX_IN_FILTER_VALUES)
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_classes_per_query: default_max_classes_per_query(),
        }
    }
}

/// OS alert delivery throttle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Whether the aggregator runs the throttle at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum time between two due-checks.
    #[serde(default = "default_interval_hours")]
    pub interval_hours: i64,
    /// Only unread notifications newer than this are alerted.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
    /// Maximum alerts per due-check.
    #[serde(default = "default_max_alerts")]
    pub max_alerts: usize,
    /// How often the cooldown is re-evaluated while running.
    #[serde(default = "default_tick_minutes")]
    pub tick_minutes: u64,
}

impl ThrottleConfig {
    /// Cooldown between due-checks.
    pub fn interval(&self) -> chrono::Duration {
        window(Some(self.interval_hours), default_interval_hours())
    }

    /// Age bound of alerted notifications.
    pub fn lookback(&self) -> chrono::Duration {
        window(Some(self.lookback_hours), default_lookback_hours())
    }

    /// Period of the re-evaluation timer. Never zero.
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_minutes.max(1).saturating_mul(60))
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: default_interval_hours(),
            lookback_hours: default_lookback_hours(),
            max_alerts: default_max_alerts(),
            tick_minutes: default_tick_minutes(),
        }
    }
}

/// Remote collection names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsConfig {
    /// Per-user private notifications.
    #[serde(default = "default_private_collection")]
    pub private: String,
    /// Per-class broadcast notifications.
    #[serde(default = "default_broadcast_collection")]
    pub broadcast: String,
    /// Broadcast read receipts.
    #[serde(default = "default_receipts_collection")]
    pub receipts: String,
    /// Activities referenced by deep links.
    #[serde(default = "default_activities_collection")]
    pub activities: String,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            private: default_private_collection(),
            broadcast: default_broadcast_collection(),
            receipts: default_receipts_collection(),
            activities: default_activities_collection(),
        }
    }
}

/// Deep-link destinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepLinkConfig {
    /// Destination that shows a single activity and needs the entity.
    #[serde(default = "default_activity_detail_page")]
    pub activity_detail_page: String,
    /// Generic listing used when the referenced activity cannot be loaded.
    #[serde(default = "default_activity_listing_page")]
    pub activity_listing_page: String,
}

impl Default for DeepLinkConfig {
    fn default() -> Self {
        Self {
            activity_detail_page: default_activity_detail_page(),
            activity_listing_page: default_activity_listing_page(),
        }
    }
}

fn default_private_limit() -> usize {
    20
}

fn default_max_age_days() -> i64 {
    7
}

fn default_max_classes_per_query() -> usize {
    MAX_IN_FILTER_VALUES
}

fn default_true() -> bool {
    true
}

fn default_interval_hours() -> i64 {
    5
}

fn default_lookback_hours() -> i64 {
    24
}

fn default_max_alerts() -> usize {
    5
}

fn default_tick_minutes() -> u64 {
    10
}

fn default_private_collection() -> String {
    "notifications".to_string()
}

fn default_broadcast_collection() -> String {
    "class_notifications".to_string()
}

fn default_receipts_collection() -> String {
    "notification_reads".to_string()
}

fn default_activities_collection() -> String {
    "activities".to_string()
}

fn default_activity_detail_page() -> String {
    "activity-detail".to_string()
}

fn default_activity_listing_page() -> String {
    "activities".to_string()
}
