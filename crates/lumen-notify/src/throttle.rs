//! Delivery throttle for OS-level alerts.
//!
//! At most once per interval (5 h by default) the throttle runs a one-shot
//! query for recent unread private notifications and raises one OS alert per
//! result. The instant of the last successful check is persisted in the local
//! store so the cadence survives restarts. A timer re-evaluates the cooldown
//! every few minutes while the session stays open.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lumen_core::config::notifications::ThrottleConfig;
use lumen_core::result::AppResult;
use lumen_core::traits::clock::Clock;
use lumen_core::traits::document_store::DocumentStore;
use lumen_core::traits::local_store::LocalStore;
use lumen_core::traits::notifier::{OsNotifier, PermissionState};
use lumen_core::types::id::UserId;
use lumen_core::types::query::{Query, SortDirection};

use crate::model::instant;
use crate::stream::private;

/// One-shot guard so the permission prompt is shown at most once per session,
/// however often throttles are created.
#[derive(Debug, Default)]
pub struct PermissionGate {
    requested: AtomicBool,
}

impl PermissionGate {
    /// Create an unused gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to prompt. Only the first caller gets `true`.
    pub fn try_claim(&self) -> bool {
        !self.requested.swap(true, Ordering::SeqCst)
    }

    /// Whether the prompt has already been claimed.
    pub fn was_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Where the throttle stands relative to its checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    /// No checkpoint recorded for this user.
    NeverChecked,
    /// Checked recently; `remaining` until the next check is due.
    Cooldown {
        /// Time left in the cooldown.
        remaining: Duration,
    },
    /// The interval has elapsed.
    Due,
}

impl ThrottleState {
    /// Whether a check should run now.
    pub fn is_due(&self) -> bool {
        !matches!(self, Self::Cooldown { .. })
    }
}

/// Result of one due-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueCheckOutcome {
    /// Alerts are not permitted; nothing happened.
    PermissionUnavailable,
    /// Still cooling down; nothing happened.
    Cooldown,
    /// The checkpoint could not be read; retried on the next tick.
    CheckpointUnavailable,
    /// The query failed; checkpoint left untouched.
    QueryFailed,
    /// Query ran, `alerts` were shown, checkpoint advanced.
    Delivered {
        /// Alerts shown successfully.
        alerts: usize,
    },
}

/// Decides when OS alerts are raised for one user.
#[derive(Debug)]
pub struct DeliveryThrottle {
    user: UserId,
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn OsNotifier>,
    local_store: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
    gate: Arc<PermissionGate>,
    config: ThrottleConfig,
    collection: String,
}

impl DeliveryThrottle {
    /// Create a throttle for `user`. `collection` is the private
    /// notification collection.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user: UserId,
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn OsNotifier>,
        local_store: Arc<dyn LocalStore>,
        clock: Arc<dyn Clock>,
        gate: Arc<PermissionGate>,
        config: ThrottleConfig,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            user,
            store,
            notifier,
            local_store,
            clock,
            gate,
            config,
            collection: collection.into(),
        }
    }

    /// Local-store key of a user's checkpoint.
    pub fn checkpoint_key(user: &UserId) -> String {
        format!("lumen:notifications:last-checked:{user}")
    }

    /// Last recorded check. An unparsable value counts as never checked.
    pub async fn last_checked(&self) -> AppResult<Option<DateTime<Utc>>> {
        let key = Self::checkpoint_key(&self.user);
        let Some(raw) = self.local_store.get(&key).await? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(at) => Ok(Some(at.with_timezone(&Utc))),
            Err(e) => {
                warn!(user_id = %self.user, "Ignoring unreadable checkpoint '{}': {}", raw, e);
                Ok(None)
            }
        }
    }

    /// Current state at the clock's now.
    pub async fn state(&self) -> AppResult<ThrottleState> {
        let Some(last) = self.last_checked().await? else {
            return Ok(ThrottleState::NeverChecked);
        };
        let elapsed = self.clock.now() - last;
        if elapsed >= self.config.interval() {
            Ok(ThrottleState::Due)
        } else {
            Ok(ThrottleState::Cooldown {
                remaining: self.config.interval() - elapsed,
            })
        }
    }

    /// Make sure alerts are permitted, prompting at most once per session.
    pub async fn ensure_permission(&self) -> bool {
        match self.notifier.permission() {
            PermissionState::Granted => true,
            PermissionState::Denied => false,
            PermissionState::Default => {
                if !self.gate.try_claim() {
                    return false;
                }
                match self.notifier.request_permission().await {
                    Ok(answer) => {
                        info!(user_id = %self.user, ?answer, "Notification permission answered");
                        answer == PermissionState::Granted
                    }
                    Err(e) => {
                        warn!(user_id = %self.user, "Notification permission request failed: {}", e);
                        false
                    }
                }
            }
        }
    }

    /// One-shot query for alert candidates.
    pub fn alert_query(&self, now: DateTime<Utc>) -> Query {
        Query::collection(self.collection.as_str())
            .where_eq("userId", self.user.as_str())
            .where_eq("read", false)
            .where_gt("timestamp", now - self.config.lookback())
            .order_by("timestamp", SortDirection::Descending)
            .limit(self.config.max_alerts)
    }

    /// Run one due-check.
    pub async fn run_due_check(&self) -> DueCheckOutcome {
        if !self.ensure_permission().await {
            return DueCheckOutcome::PermissionUnavailable;
        }

        match self.state().await {
            Ok(ThrottleState::Cooldown { remaining }) => {
                debug!(
                    user_id = %self.user,
                    remaining_minutes = remaining.num_minutes(),
                    "Alert check cooling down"
                );
                return DueCheckOutcome::Cooldown;
            }
            Ok(_) => {}
            Err(e) => {
                error!(user_id = %self.user, "Failed to read alert checkpoint: {}", e);
                return DueCheckOutcome::CheckpointUnavailable;
            }
        }

        let now = self.clock.now();
        let docs = match self.store.query(&self.alert_query(now)).await {
            Ok(docs) => docs,
            Err(e) => {
                error!(user_id = %self.user, "Alert query failed, will retry: {}", e);
                return DueCheckOutcome::QueryFailed;
            }
        };

        let mut alerts = 0;
        for notification in private::decode_snapshot(&docs) {
            match self
                .notifier
                .show(&notification.title, &notification.summary, notification.id.as_str())
                .await
            {
                Ok(()) => alerts += 1,
                Err(e) => {
                    warn!(notification_id = %notification.id, "Failed to show alert: {}", e);
                }
            }
        }

        let key = Self::checkpoint_key(&self.user);
        if let Err(e) = self.local_store.set(&key, &instant::format(&now)).await {
            error!(user_id = %self.user, "Failed to persist alert checkpoint: {}", e);
        }

        info!(user_id = %self.user, alerts, "Alert check complete");
        DueCheckOutcome::Delivered { alerts }
    }

    /// Check immediately, then on every tick until `token` is cancelled.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_due_check().await;
                }
            }
        }

        debug!(user_id = %self.user, "Alert throttle stopped");
    }
}
