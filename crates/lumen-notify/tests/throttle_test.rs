//! Integration tests for the OS alert throttle.

mod helpers;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio_util::sync::CancellationToken;

use helpers::{PRIVATE, TestEnv, VIEWER, eventually};
use lumen_core::traits::local_store::LocalStore;
use lumen_core::traits::notifier::PermissionState;
use lumen_core::types::id::UserId;
use lumen_notify::{
    DeliveryThrottle, DueCheckOutcome, NotificationAggregator, Session, ThrottleState,
};
use lumen_store::RecordingNotifier;

fn throttle(env: &TestEnv, notifier: Arc<RecordingNotifier>) -> DeliveryThrottle {
    DeliveryThrottle::new(
        VIEWER.into(),
        Arc::new(env.store.clone()),
        notifier,
        Arc::new(env.local.clone()),
        env.clock.clone(),
        env.gate.clone(),
        env.config.throttle.clone(),
        PRIVATE,
    )
}

fn checkpoint_key() -> String {
    DeliveryThrottle::checkpoint_key(&UserId::new(VIEWER))
}

async fn set_checkpoint(env: &TestEnv, ago: Duration) {
    let at = (env.now() - ago).to_rfc3339();
    env.local.set(&checkpoint_key(), &at).await.unwrap();
}

#[test]
fn test_checkpoint_key_is_per_user() {
    assert_eq!(checkpoint_key(), "lumen:notifications:last-checked:student-1");
}

#[tokio::test]
async fn test_cooldown_skips_query() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);
    set_checkpoint(&env, Duration::hours(4) + Duration::minutes(59)).await;
    let before = env.local.get(&checkpoint_key()).await.unwrap();

    let throttle = throttle(&env, env.notifier.clone());
    assert!(matches!(
        throttle.state().await.unwrap(),
        ThrottleState::Cooldown { .. }
    ));
    assert_eq!(throttle.run_due_check().await, DueCheckOutcome::Cooldown);

    assert_eq!(env.store.query_count(), 0);
    assert!(env.notifier.shown().is_empty());
    assert_eq!(env.local.get(&checkpoint_key()).await.unwrap(), before);
}

#[tokio::test]
async fn test_elapsed_interval_runs_one_query() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);
    set_checkpoint(&env, Duration::hours(5) + Duration::minutes(1)).await;

    let throttle = throttle(&env, env.notifier.clone());
    assert_eq!(throttle.state().await.unwrap(), ThrottleState::Due);
    assert_eq!(
        throttle.run_due_check().await,
        DueCheckOutcome::Delivered { alerts: 1 }
    );

    assert_eq!(env.store.query_count(), 1);
    assert_eq!(throttle.last_checked().await.unwrap(), Some(env.now()));

    // The checkpoint just moved: the next check cools down.
    assert_eq!(throttle.run_due_check().await, DueCheckOutcome::Cooldown);
    assert_eq!(env.store.query_count(), 1);
}

#[tokio::test]
async fn test_alerts_capped_to_recent_unread() {
    let env = TestEnv::new();
    for i in 1..=7 {
        env.seed_private(&format!("p{i}"), i, false);
    }
    env.seed_private("old", 30, false);
    env.seed_private("seen", 1, true);
    env.seed_private_for("student-2", "theirs", env.now(), false);

    let throttle = throttle(&env, env.notifier.clone());
    assert_eq!(throttle.state().await.unwrap(), ThrottleState::NeverChecked);
    assert_eq!(
        throttle.run_due_check().await,
        DueCheckOutcome::Delivered { alerts: 5 }
    );

    let tags: Vec<String> = env.notifier.shown().into_iter().map(|a| a.tag).collect();
    assert_eq!(tags, vec!["p1", "p2", "p3", "p4", "p5"]);
    let first = &env.notifier.shown()[0];
    assert_eq!(first.title, "Private p1");
    assert_eq!(first.body, "Summary of p1");
}

#[tokio::test]
async fn test_denied_permission_skips_everything() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);
    let notifier = Arc::new(RecordingNotifier::new(
        PermissionState::Denied,
        PermissionState::Denied,
    ));

    let throttle = throttle(&env, notifier.clone());
    assert_eq!(
        throttle.run_due_check().await,
        DueCheckOutcome::PermissionUnavailable
    );
    assert_eq!(notifier.permission_requests(), 0);
    assert_eq!(env.store.query_count(), 0);
    assert!(env.local.get(&checkpoint_key()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_permission_prompt_shown_once_per_session() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);
    let first_notifier = Arc::new(RecordingNotifier::new(
        PermissionState::Default,
        PermissionState::Granted,
    ));
    let second_notifier = Arc::new(RecordingNotifier::new(
        PermissionState::Default,
        PermissionState::Granted,
    ));

    let first = throttle(&env, first_notifier.clone());
    assert_eq!(
        first.run_due_check().await,
        DueCheckOutcome::Delivered { alerts: 1 }
    );
    assert_eq!(first_notifier.permission_requests(), 1);
    assert!(env.gate.was_requested());

    let second = throttle(&env, second_notifier.clone());
    assert_eq!(
        second.run_due_check().await,
        DueCheckOutcome::PermissionUnavailable
    );
    assert_eq!(second_notifier.permission_requests(), 0);

    // Granted now: no further prompt.
    assert_eq!(first.run_due_check().await, DueCheckOutcome::Cooldown);
    assert_eq!(first_notifier.permission_requests(), 1);
}

#[tokio::test]
async fn test_query_failure_keeps_checkpoint() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);
    let throttle = throttle(&env, env.notifier.clone());

    env.store.fail_queries(true);
    assert_eq!(throttle.run_due_check().await, DueCheckOutcome::QueryFailed);
    assert_eq!(throttle.last_checked().await.unwrap(), None);
    assert!(env.notifier.shown().is_empty());

    env.store.fail_queries(false);
    assert_eq!(
        throttle.run_due_check().await,
        DueCheckOutcome::Delivered { alerts: 1 }
    );
    assert_eq!(throttle.last_checked().await.unwrap(), Some(env.now()));
}

#[tokio::test]
async fn test_show_failure_still_advances_checkpoint() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);
    env.notifier.fail_show(true);

    let throttle = throttle(&env, env.notifier.clone());
    assert_eq!(
        throttle.run_due_check().await,
        DueCheckOutcome::Delivered { alerts: 0 }
    );
    assert_eq!(throttle.last_checked().await.unwrap(), Some(env.now()));
}

#[tokio::test]
async fn test_unreadable_checkpoint_counts_as_never_checked() {
    let env = TestEnv::new();
    env.local
        .set(&checkpoint_key(), "yesterday-ish")
        .await
        .unwrap();

    let throttle = throttle(&env, env.notifier.clone());
    assert_eq!(throttle.state().await.unwrap(), ThrottleState::NeverChecked);
}

#[tokio::test(start_paused = true)]
async fn test_timer_rechecks_cooldown() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);

    let throttle = Arc::new(throttle(&env, env.notifier.clone()));
    let token = CancellationToken::new();
    let handle = tokio::spawn(Arc::clone(&throttle).run(token.clone()));

    // First tick fires immediately.
    eventually(|| env.store.query_count() == 1).await;
    assert_eq!(env.notifier.shown().len(), 1);

    env.clock.advance(Duration::minutes(10));
    tokio::time::sleep(StdDuration::from_secs(600)).await;
    assert_eq!(env.store.query_count(), 1);

    env.clock.advance(Duration::hours(5));
    tokio::time::sleep(StdDuration::from_secs(600)).await;
    assert_eq!(env.store.query_count(), 2);
    assert_eq!(env.notifier.shown().len(), 2);

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_aggregator_runs_throttle_with_notifier() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);

    let aggregator =
        NotificationAggregator::start(env.deps_with_notifier(), Session::new(VIEWER.into(), Vec::new()))
            .unwrap();

    eventually(|| env.notifier.shown().len() == 1).await;
    assert_eq!(env.notifier.shown()[0].tag, "p1");

    aggregator.shutdown().await;
}

#[tokio::test]
async fn test_aggregator_without_notifier_raises_no_alerts() {
    let env = TestEnv::new();
    env.seed_private("p1", 1, false);

    let aggregator =
        NotificationAggregator::start(env.deps(), Session::new(VIEWER.into(), Vec::new())).unwrap();
    helpers::feed_where(&aggregator, |feed| feed.len() == 1).await;

    assert_eq!(env.store.query_count(), 0);
    assert!(env.notifier.shown().is_empty());

    aggregator.shutdown().await;
}
