//! Navigation callback used when a notification is opened.

use crate::types::document::Document;

/// Leaves the notification subsystem towards a destination of the host UI.
pub trait Navigator: Send + Sync + std::fmt::Debug + 'static {
    /// Navigate to `destination`, optionally handing over a loaded entity.
    fn navigate(&self, destination: &str, entity: Option<Document>);
}
