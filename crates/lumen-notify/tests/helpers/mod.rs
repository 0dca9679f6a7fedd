//! Shared test helpers for notification integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use lumen_core::config::notifications::NotificationsConfig;
use lumen_core::traits::navigator::Navigator;
use lumen_core::types::document::Document;
use lumen_core::types::id::ClassId;
use lumen_notify::receipts::ReadReceipt;
use lumen_notify::{AggregatorDeps, MergedFeed, NotificationAggregator, PermissionGate};
use lumen_store::{ManualClock, MemoryDocumentStore, MemoryLocalStore, RecordingNotifier};

pub const VIEWER: &str = "student-1";
pub const PRIVATE: &str = "notifications";
pub const BROADCAST: &str = "class_notifications";
pub const RECEIPTS: &str = "notification_reads";
pub const ACTIVITIES: &str = "activities";

/// Navigator that remembers every call.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    calls: Mutex<Vec<(String, Option<Document>)>>,
}

impl RecordingNavigator {
    pub fn calls(&self) -> Vec<(String, Option<Document>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, destination: &str, entity: Option<Document>) {
        self.calls
            .lock()
            .unwrap()
            .push((destination.to_string(), entity));
    }
}

/// Test environment with in-memory collaborators and a frozen clock.
pub struct TestEnv {
    pub store: MemoryDocumentStore,
    pub local: MemoryLocalStore,
    pub notifier: Arc<RecordingNotifier>,
    pub navigator: Arc<RecordingNavigator>,
    pub clock: Arc<ManualClock>,
    pub gate: Arc<PermissionGate>,
    pub config: NotificationsConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            store: MemoryDocumentStore::new(),
            local: MemoryLocalStore::new(),
            notifier: Arc::new(RecordingNotifier::granted()),
            navigator: Arc::new(RecordingNavigator::default()),
            clock: Arc::new(ManualClock::new(start_time())),
            gate: Arc::new(PermissionGate::new()),
            config: NotificationsConfig::default(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        use lumen_core::traits::clock::Clock;
        self.clock.now()
    }

    /// Dependencies without an OS notifier, so no throttle runs.
    pub fn deps(&self) -> AggregatorDeps {
        AggregatorDeps {
            store: Arc::new(self.store.clone()),
            local_store: Arc::new(self.local.clone()),
            notifier: None,
            navigator: self.navigator.clone(),
            clock: self.clock.clone(),
            permission_gate: self.gate.clone(),
            config: self.config.clone(),
        }
    }

    /// Dependencies with the recording notifier attached.
    pub fn deps_with_notifier(&self) -> AggregatorDeps {
        AggregatorDeps {
            notifier: Some(self.notifier.clone()),
            ..self.deps()
        }
    }

    pub fn seed_private(&self, id: &str, hours_ago: i64, read: bool) {
        self.seed_private_for(VIEWER, id, self.now() - Duration::hours(hours_ago), read);
    }

    pub fn seed_private_for(&self, user: &str, id: &str, at: DateTime<Utc>, read: bool) {
        self.store.insert(
            PRIVATE,
            id,
            json!({
                "userId": user,
                "title": format!("Private {id}"),
                "summary": format!("Summary of {id}"),
                "type": "activity_correction",
                "urgency": "high",
                "timestamp": at.to_rfc3339(),
                "read": read,
                "deepLink": {"page": "grades"}
            }),
        );
    }

    pub fn seed_broadcast(&self, id: &str, class: &str, hours_ago: i64) {
        self.seed_broadcast_expiring(id, class, hours_ago, 72);
    }

    pub fn seed_broadcast_expiring(&self, id: &str, class: &str, hours_ago: i64, expires_in_hours: i64) {
        let now = self.now();
        self.store.insert(
            BROADCAST,
            id,
            json!({
                "classId": class,
                "title": format!("Broadcast {id}"),
                "summary": "Class announcement",
                "type": "module_post",
                "createdAt": (now - Duration::hours(hours_ago)).to_rfc3339(),
                "expiresAt": (now + Duration::hours(expires_in_hours)).to_rfc3339(),
                "deepLink": {"page": "modules"}
            }),
        );
    }

    pub fn seed_receipt(&self, notification: &str) -> ReadReceipt {
        let receipt = ReadReceipt::new(VIEWER.into(), notification.into(), self.now());
        self.store
            .insert(RECEIPTS, &receipt.document_id(), receipt.to_value().unwrap());
        receipt
    }
}

fn start_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-10-18T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn classes(n: usize) -> Vec<ClassId> {
    (0..n).map(|i| ClassId::new(format!("class-{i}"))).collect()
}

/// Wait for the aggregator's feed to satisfy `predicate`, failing after 5s.
pub async fn feed_where<F>(aggregator: &NotificationAggregator, predicate: F) -> MergedFeed
where
    F: FnMut(&MergedFeed) -> bool,
{
    tokio::time::timeout(StdDuration::from_secs(5), aggregator.wait_for(predicate))
        .await
        .expect("feed did not reach expected state")
        .unwrap()
}

/// Poll `condition` until it holds, failing after 5s.
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}
