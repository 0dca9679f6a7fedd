//! Integration tests for mark-read and deep-link actions.

mod helpers;

use serde_json::json;

use helpers::{ACTIVITIES, PRIVATE, RECEIPTS, TestEnv, VIEWER, classes, eventually, feed_where};
use lumen_core::error::ErrorKind;
use lumen_core::types::id::{NotificationId, UserId};
use lumen_notify::model::DeepLink;
use lumen_notify::receipts;
use lumen_notify::{NotificationAggregator, OpenOutcome, Session};

async fn started(env: &TestEnv, class_count: usize) -> NotificationAggregator {
    NotificationAggregator::start(env.deps(), Session::new(VIEWER.into(), classes(class_count)))
        .unwrap()
}

fn receipt_id(notification: &str) -> String {
    receipts::document_id(&UserId::new(VIEWER), &NotificationId::new(notification))
}

#[tokio::test]
async fn test_mark_all_read_writes_one_batch() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);
    env.seed_private("p2", 2, false);
    env.seed_broadcast("b1", "class-0", 3);
    env.seed_broadcast("b2", "class-0", 4);
    env.seed_receipt("b2");

    let aggregator = started(&env, 1).await;
    feed_where(&aggregator, |feed| feed.len() == 4 && feed.unread_count == 3).await;

    let written = aggregator.dispatcher().mark_all_read().await;
    assert_eq!(written, 3);
    assert_eq!(env.store.commit_count(), 1);

    for id in ["p1", "p2"] {
        let doc = env.store.document(PRIVATE, id).unwrap();
        assert_eq!(doc.data["read"], json!(true));
    }
    let receipt = env.store.document(RECEIPTS, &receipt_id("b1")).unwrap();
    assert_eq!(receipt.data["userId"], json!(VIEWER));
    assert_eq!(receipt.data["notificationId"], json!("b1"));
    // Already-read broadcasts get no second receipt.
    assert_eq!(env.store.documents(RECEIPTS).len(), 2);

    let feed = feed_where(&aggregator, |feed| feed.unread_count == 0).await;
    assert_eq!(feed.len(), 2);
    assert_eq!(aggregator.dispatcher().mark_all_read().await, 0);
    assert_eq!(env.store.commit_count(), 1);

    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_mark_all_read_failure_changes_nothing() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);
    env.seed_broadcast("b1", "class-0", 2);

    let aggregator = started(&env, 1).await;
    feed_where(&aggregator, |feed| feed.unread_count == 2).await;

    env.store.fail_writes(true);
    assert_eq!(aggregator.dispatcher().mark_all_read().await, 0);

    assert_eq!(env.store.document(PRIVATE, "p1").unwrap().data["read"], json!(false));
    assert!(env.store.documents(RECEIPTS).is_empty());
    assert_eq!(aggregator.unread_count(), 2);

    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_mark_read_private() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);
    env.seed_private("p2", 2, false);

    let aggregator = started(&env, 0).await;
    feed_where(&aggregator, |feed| feed.len() == 2).await;

    assert!(aggregator.dispatcher().mark_read(&NotificationId::new("p1")).await);
    assert_eq!(env.store.document(PRIVATE, "p1").unwrap().data["read"], json!(true));
    assert!(env.store.documents(RECEIPTS).is_empty());

    let feed = feed_where(&aggregator, |feed| feed.len() == 1).await;
    assert_eq!(feed.items[0].id.as_str(), "p2");
    assert_eq!(feed.unread_count, 1);

    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_mark_read_broadcast_creates_receipt() {
    let env = TestEnv::new();
    env.seed_broadcast("b1", "class-0", 1);

    let aggregator = started(&env, 1).await;
    feed_where(&aggregator, |feed| feed.unread_count == 1).await;

    let dispatcher = aggregator.dispatcher();
    assert!(dispatcher.mark_read(&NotificationId::new("b1")).await);
    assert!(env.store.document(RECEIPTS, &receipt_id("b1")).is_some());

    let feed = feed_where(&aggregator, |feed| feed.unread_count == 0).await;
    assert!(feed.items[0].read);

    // Read already: nothing else is written.
    assert!(dispatcher.mark_read(&NotificationId::new("b1")).await);
    assert_eq!(env.store.documents(RECEIPTS).len(), 1);

    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_mark_read_unknown_id() {
    let env = TestEnv::new();
    let aggregator = started(&env, 0).await;
    assert!(!aggregator.dispatcher().mark_read(&NotificationId::new("nope")).await);
    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_open_activity_detail() {
    let env = TestEnv::new();
    env.store.insert(ACTIVITIES, "act-7", json!({"title": "Essay draft"}));
    env.seed_broadcast("b1", "class-0", 1);

    let aggregator = started(&env, 1).await;
    let feed = feed_where(&aggregator, |feed| feed.len() == 1).await;

    let mut notification = feed.items[0].clone();
    notification.deep_link = DeepLink::entity("activity-detail", "act-7");

    let outcome = aggregator.dispatcher().resolve_and_open(&notification).await;
    assert!(matches!(outcome, OpenOutcome::Opened { .. }));
    assert_eq!(outcome.destination(), "activity-detail");

    let calls = env.navigator.calls();
    assert_eq!(calls.len(), 1);
    let (destination, entity) = &calls[0];
    assert_eq!(destination, "activity-detail");
    let entity = entity.as_ref().unwrap();
    assert_eq!(entity.id, "act-7");
    assert_eq!(entity.data["title"], json!("Essay draft"));

    // Opening marked it read.
    assert!(env.store.document(RECEIPTS, &receipt_id("b1")).is_some());

    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_open_missing_activity_falls_back() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);

    let aggregator = started(&env, 0).await;
    let feed = feed_where(&aggregator, |feed| feed.len() == 1).await;

    let mut notification = feed.items[0].clone();
    notification.deep_link = DeepLink::entity("activity-detail", "deleted");

    let outcome = aggregator.dispatcher().resolve_and_open(&notification).await;
    assert_eq!(outcome.destination(), "activities");
    assert_eq!(outcome.error().unwrap().kind, ErrorKind::NotFound);
    assert_eq!(env.navigator.calls(), vec![("activities".to_string(), None)]);
    assert_eq!(env.store.document(PRIVATE, "p1").unwrap().data["read"], json!(true));

    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_open_activity_load_error_falls_back() {
    let env = TestEnv::new();
    env.store.insert(ACTIVITIES, "act-7", json!({"title": "Essay draft"}));
    env.seed_broadcast("b1", "class-0", 1);

    let aggregator = started(&env, 1).await;
    let feed = feed_where(&aggregator, |feed| feed.len() == 1).await;

    let mut notification = feed.items[0].clone();
    notification.deep_link = DeepLink::entity("activity-detail", "act-7");

    env.store.fail_gets(true);
    let outcome = aggregator.dispatcher().resolve_and_open(&notification).await;
    assert!(matches!(outcome, OpenOutcome::FellBack { .. }));
    assert_eq!(outcome.error().unwrap().kind, ErrorKind::Store);
    assert_eq!(env.navigator.calls()[0].0, "activities");

    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_open_plain_page_link() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, true);
    env.seed_broadcast("b1", "class-0", 1);
    env.seed_receipt("b1");

    let aggregator = started(&env, 1).await;
    let feed = feed_where(&aggregator, |feed| feed.len() == 1 && feed.unread_count == 0).await;
    let notification = feed.items[0].clone();
    assert!(notification.read);

    let outcome = aggregator.dispatcher().resolve_and_open(&notification).await;
    assert_eq!(outcome.destination(), "modules");
    assert!(outcome.error().is_none());
    assert_eq!(env.navigator.calls(), vec![("modules".to_string(), None)]);

    // Read items are not written again.
    eventually(|| env.store.documents(RECEIPTS).len() == 1).await;

    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_failed_private_mark_read_restores_item() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);

    let aggregator = started(&env, 0).await;
    feed_where(&aggregator, |feed| feed.unread_count == 1).await;

    env.store.fail_writes(true);
    assert!(!aggregator.dispatcher().mark_read(&NotificationId::new("p1")).await);
    assert_eq!(env.store.document(PRIVATE, "p1").unwrap().data["read"], json!(false));

    env.seed_private("p2", 2, false);
    let feed = feed_where(&aggregator, |feed| feed.len() == 2).await;
    assert_eq!(feed.unread_count, 2);
    assert!(!feed.get(&NotificationId::new("p1")).unwrap().read);

    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_failed_broadcast_mark_read_restores_unread() {
    let env = TestEnv::new();
    env.seed_broadcast("b1", "class-0", 1);

    let aggregator = started(&env, 1).await;
    feed_where(&aggregator, |feed| feed.unread_count == 1).await;

    env.store.fail_writes(true);
    assert!(!aggregator.dispatcher().mark_read(&NotificationId::new("b1")).await);
    assert!(env.store.documents(RECEIPTS).is_empty());

    env.seed_broadcast("b2", "class-0", 2);
    let feed = feed_where(&aggregator, |feed| feed.len() == 2).await;
    assert_eq!(feed.unread_count, 2);
    assert!(!feed.get(&NotificationId::new("b1")).unwrap().read);

    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_activity_detail_link_without_id_opens_page() {
    let env = TestEnv::new();
    env.seed_broadcast("b1", "class-0", 1);
    env.seed_receipt("b1");

    let aggregator = started(&env, 1).await;
    let feed = feed_where(&aggregator, |feed| feed.len() == 1 && feed.unread_count == 0).await;

    for link in [
        DeepLink::page("activity-detail"),
        DeepLink::entity("activity-detail", ""),
    ] {
        let mut notification = feed.items[0].clone();
        notification.deep_link = link;

        let outcome = aggregator.dispatcher().resolve_and_open(&notification).await;
        assert!(matches!(outcome, OpenOutcome::Opened { .. }));
        assert_eq!(outcome.destination(), "activity-detail");
    }

    assert_eq!(
        env.navigator.calls(),
        vec![
            ("activity-detail".to_string(), None),
            ("activity-detail".to_string(), None),
        ]
    );

    aggregator.shutdown().await;
}
