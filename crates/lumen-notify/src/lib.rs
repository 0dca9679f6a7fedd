//! # lumen-notify
//!
//! Notification aggregation for Lumen. Provides:
//!
//! - Live private (per-user) and broadcast (per-class) notification streams
//! - Read receipts for broadcasts
//! - A pure merger producing one deduplicated, newest-first feed
//! - A delivery throttle raising OS alerts at most once per interval
//! - An action dispatcher for mark-read and deep-link navigation

pub mod aggregator;
pub mod dispatcher;
pub mod merger;
pub mod model;
pub mod receipts;
pub mod state;
pub mod stream;
pub mod throttle;

pub use aggregator::{AggregatorDeps, NotificationAggregator, Session};
pub use dispatcher::{ActionDispatcher, OpenOutcome};
pub use merger::{MergedFeed, merge};
pub use model::{DeepLink, Notification, NotificationSource, NotificationType, Urgency};
pub use throttle::{DeliveryThrottle, DueCheckOutcome, PermissionGate, ThrottleState};
