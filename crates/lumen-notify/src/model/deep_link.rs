//! Navigation target attached to a notification.

use serde::{Deserialize, Serialize};

/// Where opening a notification should lead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeepLink {
    /// Destination identifier understood by the host UI.
    pub page: String,
    /// Entity the destination should show, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl DeepLink {
    /// Link to a destination without an entity.
    pub fn page(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            id: None,
        }
    }

    /// Link to a specific entity on a destination.
    pub fn entity(page: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            id: Some(id.into()),
        }
    }

    /// Entity id, if present and non-empty.
    pub fn entity_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

impl Default for DeepLink {
    /// Records without a link open the notification center.
    fn default() -> Self {
        Self::page("notifications")
    }
}
