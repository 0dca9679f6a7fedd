//! Live notification sources and the pump that drives them.

pub mod broadcast;
pub mod private;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use lumen_core::traits::document_store::Subscription;
use lumen_core::types::document::Document;

/// Drive a live subscription until `token` is cancelled or `on_snapshot`
/// returns `false`.
///
/// Subscription errors are logged and otherwise ignored, so whatever the
/// consumer built from the last good snapshot stays in effect.
pub(crate) async fn forward_snapshots<F>(
    mut subscription: Subscription,
    stream: &'static str,
    token: CancellationToken,
    mut on_snapshot: F,
) where
    F: FnMut(Vec<Document>) -> bool + Send,
{
    loop {
        let snapshot = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            snapshot = subscription.next_snapshot() => snapshot,
        };

        match snapshot {
            Some(Ok(docs)) => {
                if !on_snapshot(docs) {
                    break;
                }
            }
            Some(Err(e)) => {
                warn!(stream, "Live query error, keeping last snapshot: {}", e);
            }
            None => {
                debug!(stream, "Live query ended");
                break;
            }
        }
    }
    subscription.cancel();
}
