//! OS-level notification trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// Tri-state OS notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// The user has not been asked yet.
    Default,
    /// Alerts may be shown.
    Granted,
    /// The user refused alerts.
    Denied,
}

/// Native notification surface of the host platform.
#[async_trait]
pub trait OsNotifier: Send + Sync + std::fmt::Debug + 'static {
    /// Current permission without prompting.
    fn permission(&self) -> PermissionState;

    /// Prompt the user for permission and return the answer.
    async fn request_permission(&self) -> AppResult<PermissionState>;

    /// Show an alert. Alerts sharing a `tag` replace each other.
    async fn show(&self, title: &str, body: &str, tag: &str) -> AppResult<()>;
}
