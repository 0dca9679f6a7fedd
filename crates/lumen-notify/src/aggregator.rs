//! The notification aggregator for one signed-in viewer.
//!
//! Owns every live subscription, the event loop that turns source updates
//! into a [`MergedFeed`], and the optional alert throttle. All of it stops
//! when the aggregator is shut down or dropped.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use lumen_core::config::notifications::NotificationsConfig;
use lumen_core::error::AppError;
use lumen_core::result::AppResult;
use lumen_core::traits::clock::Clock;
use lumen_core::traits::document_store::DocumentStore;
use lumen_core::traits::local_store::LocalStore;
use lumen_core::traits::navigator::Navigator;
use lumen_core::traits::notifier::OsNotifier;
use lumen_core::types::id::{ClassId, UserId};

use crate::dispatcher::ActionDispatcher;
use crate::merger::MergedFeed;
use crate::receipts;
use crate::state::{FeedEvent, FeedState};
use crate::stream::broadcast::{self, BroadcastSource};
use crate::stream::{forward_snapshots, private};
use crate::throttle::{DeliveryThrottle, PermissionGate};

/// Collaborators shared by every aggregator of a process.
#[derive(Debug, Clone)]
pub struct AggregatorDeps {
    /// Remote document store.
    pub store: Arc<dyn DocumentStore>,
    /// Local durable key-value store (throttle checkpoint).
    pub local_store: Arc<dyn LocalStore>,
    /// OS alert surface. `None` disables the throttle.
    pub notifier: Option<Arc<dyn OsNotifier>>,
    /// Navigation callback for opened notifications.
    pub navigator: Arc<dyn Navigator>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Session-wide permission prompt guard.
    pub permission_gate: Arc<PermissionGate>,
    /// Settings.
    pub config: NotificationsConfig,
}

/// Who is viewing, and which classes they belong to if already known.
#[derive(Debug, Clone)]
pub struct Session {
    /// Signed-in user.
    pub user_id: UserId,
    /// Class memberships. `None` until loaded; broadcasts wait for it.
    pub classes: Option<Vec<ClassId>>,
}

impl Session {
    /// Session whose class list is already known.
    pub fn new(user_id: UserId, classes: Vec<ClassId>) -> Self {
        Self {
            user_id,
            classes: Some(classes),
        }
    }

    /// Session whose class list will be supplied later.
    pub fn pending_classes(user_id: UserId) -> Self {
        Self {
            user_id,
            classes: None,
        }
    }
}

/// Live, merged notification feed for one viewer.
#[derive(Debug)]
pub struct NotificationAggregator {
    user_id: UserId,
    feed: watch::Receiver<MergedFeed>,
    classes: watch::Sender<Option<Vec<ClassId>>>,
    dispatcher: ActionDispatcher,
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl NotificationAggregator {
    /// Open all subscriptions for `session` and start publishing the feed.
    ///
    /// Must be called from within a Tokio runtime. Fails only if the session
    /// has no user.
    pub fn start(deps: AggregatorDeps, session: Session) -> AppResult<Self> {
        let Session { user_id, classes } = session;
        if user_id.is_empty() {
            return Err(AppError::validation(
                "Notification aggregator needs a signed-in user",
            ));
        }

        let config = Arc::new(deps.config);
        let token = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (feed_tx, feed_rx) = watch::channel(MergedFeed::default());
        let (classes_tx, classes_rx) = watch::channel(classes);

        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(run_feed_loop(
            events_rx,
            feed_tx,
            Arc::clone(&deps.clock),
            config.feed.max_age(),
            user_id.clone(),
            token.clone(),
        )));

        // Private stream.
        {
            let store = Arc::clone(&deps.store);
            let query = private::live_query(&config, &user_id);
            let events = events_tx.clone();
            let token = token.clone();
            let user = user_id.clone();
            tasks.push(tokio::spawn(async move {
                match store.subscribe(query).await {
                    Ok(subscription) => {
                        forward_snapshots(subscription, "private", token, move |docs| {
                            events
                                .send(FeedEvent::Private(private::decode_snapshot(&docs)))
                                .is_ok()
                        })
                        .await
                    }
                    Err(e) => error!(user_id = %user, "Failed to open private stream: {}", e),
                }
            }));
        }

        // Receipts.
        {
            let store = Arc::clone(&deps.store);
            let query = receipts::live_query(&config.collections.receipts, &user_id);
            let events = events_tx.clone();
            let token = token.clone();
            let user = user_id.clone();
            tasks.push(tokio::spawn(async move {
                match store.subscribe(query).await {
                    Ok(subscription) => {
                        forward_snapshots(subscription, "receipts", token, move |docs| {
                            events
                                .send(FeedEvent::Receipts(receipts::decode_snapshot(&docs)))
                                .is_ok()
                        })
                        .await
                    }
                    Err(e) => error!(user_id = %user, "Failed to open receipt stream: {}", e),
                }
            }));
        }

        // Broadcasts.
        tasks.push(tokio::spawn(broadcast::run_manager(
            BroadcastSource {
                store: Arc::clone(&deps.store),
                clock: Arc::clone(&deps.clock),
                viewer: user_id.clone(),
                collection: config.collections.broadcast.clone(),
                batch_size: config.broadcast.batch_size(),
            },
            classes_rx,
            events_tx.clone(),
            token.clone(),
        )));

        // Alert throttle.
        match (&deps.notifier, config.throttle.enabled) {
            (Some(notifier), true) => {
                let throttle = Arc::new(DeliveryThrottle::new(
                    user_id.clone(),
                    Arc::clone(&deps.store),
                    Arc::clone(notifier),
                    Arc::clone(&deps.local_store),
                    Arc::clone(&deps.clock),
                    Arc::clone(&deps.permission_gate),
                    config.throttle.clone(),
                    config.collections.private.clone(),
                ));
                tasks.push(tokio::spawn(throttle.run(token.clone())));
            }
            _ => debug!(user_id = %user_id, "Alert throttle disabled"),
        }

        let dispatcher = ActionDispatcher::new(
            user_id.clone(),
            Arc::clone(&deps.store),
            Arc::clone(&deps.navigator),
            Arc::clone(&deps.clock),
            Arc::clone(&config),
            feed_rx.clone(),
            events_tx,
        );

        info!(user_id = %user_id, "Notification aggregator started");

        Ok(Self {
            user_id,
            feed: feed_rx,
            classes: classes_tx,
            dispatcher,
            token,
            tasks,
        })
    }

    /// Viewer this aggregator serves.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Receiver that observes every published feed.
    pub fn feed(&self) -> watch::Receiver<MergedFeed> {
        self.feed.clone()
    }

    /// Latest published feed.
    pub fn snapshot(&self) -> MergedFeed {
        self.feed.borrow().clone()
    }

    /// Unread entries in the latest published feed.
    pub fn unread_count(&self) -> usize {
        self.feed.borrow().unread_count
    }

    /// Wait until the published feed satisfies `predicate`.
    pub async fn wait_for<F>(&self, predicate: F) -> AppResult<MergedFeed>
    where
        F: FnMut(&MergedFeed) -> bool,
    {
        let mut feed = self.feed.clone();
        feed.wait_for(predicate)
            .await
            .map(|feed| feed.clone())
            .map_err(|_| AppError::service_unavailable("Notification feed closed"))
    }

    /// Replace the viewer's class memberships. All broadcast subscriptions
    /// are torn down and reopened.
    pub fn set_classes(&self, classes: Vec<ClassId>) {
        self.classes.send_replace(Some(classes));
    }

    /// Handle for user actions on this feed.
    pub fn dispatcher(&self) -> ActionDispatcher {
        self.dispatcher.clone()
    }

    /// Cancel every subscription and timer and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                error!(user_id = %self.user_id, "Aggregator task panicked: {}", e);
            }
        }
        info!(user_id = %self.user_id, "Notification aggregator stopped");
    }
}

impl Drop for NotificationAggregator {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_feed_loop(
    mut events: mpsc::UnboundedReceiver<FeedEvent>,
    feed: watch::Sender<MergedFeed>,
    clock: Arc<dyn Clock>,
    max_age: chrono::Duration,
    user: UserId,
    token: CancellationToken,
) {
    let mut state = FeedState::default();

    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        if !state.apply(event) {
            continue;
        }

        let merged = state.merged(clock.now(), max_age);
        debug!(
            user_id = %user,
            items = merged.len(),
            unread = merged.unread_count,
            "Feed updated"
        );
        feed.send_replace(merged);
    }
}
