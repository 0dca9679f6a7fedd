//! Actions on the merged feed: marking read and opening deep links.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use lumen_core::config::notifications::NotificationsConfig;
use lumen_core::error::AppError;
use lumen_core::result::AppResult;
use lumen_core::traits::clock::Clock;
use lumen_core::traits::document_store::DocumentStore;
use lumen_core::traits::navigator::Navigator;
use lumen_core::types::document::WriteBatch;
use lumen_core::types::id::{NotificationId, UserId};

use crate::merger::MergedFeed;
use crate::model::{Notification, NotificationSource};
use crate::receipts::{self, ReadReceipt};
use crate::state::FeedEvent;

/// What happened when a notification was opened.
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    /// Navigated to the intended destination.
    Opened {
        /// Destination identifier.
        destination: String,
    },
    /// The linked entity could not be loaded; navigated to the fallback.
    FellBack {
        /// Fallback destination identifier.
        destination: String,
        /// Why the intended destination was not reachable. Meant for a
        /// user-facing notice.
        error: AppError,
    },
}

impl OpenOutcome {
    /// Destination that was navigated to.
    pub fn destination(&self) -> &str {
        match self {
            Self::Opened { destination } | Self::FellBack { destination, .. } => destination,
        }
    }

    /// The recoverable error, if the fallback was taken.
    pub fn error(&self) -> Option<&AppError> {
        match self {
            Self::Opened { .. } => None,
            Self::FellBack { error, .. } => Some(error),
        }
    }
}

/// Executes user actions against the feed of one viewer.
///
/// Writes go to the document store; local effects are sent to the
/// aggregator's event loop so the feed reflects them without waiting for
/// the live queries to catch up.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    user: UserId,
    store: Arc<dyn DocumentStore>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    config: Arc<NotificationsConfig>,
    feed: watch::Receiver<MergedFeed>,
    events: mpsc::UnboundedSender<FeedEvent>,
}

impl ActionDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        user: UserId,
        store: Arc<dyn DocumentStore>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
        config: Arc<NotificationsConfig>,
        feed: watch::Receiver<MergedFeed>,
        events: mpsc::UnboundedSender<FeedEvent>,
    ) -> Self {
        Self {
            user,
            store,
            navigator,
            clock,
            config,
            feed,
            events,
        }
    }

    fn emit(&self, event: FeedEvent) {
        if self.events.send(event).is_err() {
            debug!(user_id = %self.user, "Feed loop gone, dropping local update");
        }
    }

    fn receipt(&self, id: &NotificationId) -> ReadReceipt {
        ReadReceipt::new(self.user.clone(), id.clone(), self.clock.now())
    }

    /// Mark every unread entry of the current feed as read in one atomic
    /// batch. Returns the number of entries written; `0` if there was
    /// nothing to do or the batch failed (failures are logged).
    pub async fn mark_all_read(&self) -> usize {
        let feed = self.feed.borrow().clone();
        let unread: Vec<Notification> = feed.unread().cloned().collect();
        if unread.is_empty() {
            return 0;
        }

        let batch = match self.build_mark_all_batch(&unread) {
            Ok(batch) => batch,
            Err(e) => {
                error!(user_id = %self.user, "Failed to build mark-all-read batch: {}", e);
                return 0;
            }
        };

        if let Err(e) = self.store.commit(batch).await {
            error!(
                user_id = %self.user,
                items = unread.len(),
                "Mark-all-read batch failed: {}",
                e
            );
            return 0;
        }

        for item in &unread {
            self.emit(match item.source {
                NotificationSource::Private => FeedEvent::PrivateMarkedRead(item.id.clone()),
                NotificationSource::Broadcast => FeedEvent::ReceiptAdded(item.id.clone()),
            });
        }

        info!(user_id = %self.user, items = unread.len(), "Marked all notifications read");
        unread.len()
    }

    fn build_mark_all_batch(&self, unread: &[Notification]) -> AppResult<WriteBatch> {
        let collections = &self.config.collections;
        let mut batch = WriteBatch::new();
        for item in unread {
            match item.source {
                NotificationSource::Private => {
                    batch.update(
                        &collections.private,
                        item.id.as_str(),
                        serde_json::json!({ "read": true }),
                    );
                }
                NotificationSource::Broadcast => {
                    receipts::stage(&mut batch, &collections.receipts, &self.receipt(&item.id))?;
                }
            }
        }
        Ok(batch)
    }

    /// Mark one entry read. Returns `true` if the write succeeded or the
    /// entry was already read; `false` if it is unknown or the write failed.
    pub async fn mark_read(&self, id: &NotificationId) -> bool {
        let item = self.feed.borrow().get(id).cloned();
        let Some(item) = item else {
            debug!(user_id = %self.user, notification_id = %id, "Mark-read on unknown notification");
            return false;
        };
        if item.read {
            return true;
        }

        let collections = &self.config.collections;
        let result = match item.source {
            NotificationSource::Private => {
                self.emit(FeedEvent::PrivateMarkedRead(id.clone()));
                self.store
                    .update(
                        &collections.private,
                        id.as_str(),
                        serde_json::json!({ "read": true }),
                    )
                    .await
            }
            NotificationSource::Broadcast => {
                self.emit(FeedEvent::ReceiptAdded(id.clone()));
                receipts::write(&*self.store, &collections.receipts, &self.receipt(id)).await
            }
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                self.emit(match item.source {
                    NotificationSource::Private => FeedEvent::PrivateReadFailed(id.clone()),
                    NotificationSource::Broadcast => FeedEvent::ReceiptFailed(id.clone()),
                });
                warn!(
                    user_id = %self.user,
                    notification_id = %id,
                    source = ?item.source,
                    "Failed to mark notification read: {}",
                    e
                );
                false
            }
        }
    }

    /// Open a notification: mark it read if needed, then navigate to its
    /// deep link. Activity-detail links load the activity first and fall
    /// back to the activity listing if it cannot be loaded.
    pub async fn resolve_and_open(&self, notification: &Notification) -> OpenOutcome {
        if !notification.read {
            self.mark_read(&notification.id).await;
        }

        let links = &self.config.deep_links;
        let link = &notification.deep_link;

        if link.page == links.activity_detail_page {
            if let Some(activity_id) = link.entity_id() {
                return self.open_activity(activity_id).await;
            }
        }

        self.navigator.navigate(&link.page, None);
        OpenOutcome::Opened {
            destination: link.page.clone(),
        }
    }

    async fn open_activity(&self, activity_id: &str) -> OpenOutcome {
        let links = &self.config.deep_links;
        let collection = &self.config.collections.activities;

        let error = match self.store.get(collection, activity_id).await {
            Ok(Some(activity)) => {
                self.navigator
                    .navigate(&links.activity_detail_page, Some(activity));
                return OpenOutcome::Opened {
                    destination: links.activity_detail_page.clone(),
                };
            }
            Ok(None) => AppError::not_found(format!("Activity '{activity_id}' no longer exists")),
            Err(e) => {
                error!(activity_id, "Failed to load linked activity: {}", e);
                e
            }
        };

        warn!(activity_id, "Falling back to activity listing: {}", error);
        self.navigator.navigate(&links.activity_listing_page, None);
        OpenOutcome::FellBack {
            destination: links.activity_listing_page.clone(),
            error,
        }
    }
}
