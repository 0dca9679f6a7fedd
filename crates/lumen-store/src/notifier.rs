//! OS notifier implementations.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::info;

use lumen_core::error::AppError;
use lumen_core::result::AppResult;
use lumen_core::traits::notifier::{OsNotifier, PermissionState};

/// Notifier for headless hosts: alerts become log lines.
#[derive(Debug)]
pub struct TracingNotifier {
    permission: Mutex<PermissionState>,
    answer: PermissionState,
}

impl TracingNotifier {
    /// Create a notifier that starts at `permission` and answers prompts
    /// with `answer`.
    pub fn new(permission: PermissionState, answer: PermissionState) -> Self {
        Self {
            permission: Mutex::new(permission),
            answer,
        }
    }

    /// Notifier that is already allowed to show alerts.
    pub fn granted() -> Self {
        Self::new(PermissionState::Granted, PermissionState::Granted)
    }
}

#[async_trait]
impl OsNotifier for TracingNotifier {
    fn permission(&self) -> PermissionState {
        *self.permission.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn request_permission(&self) -> AppResult<PermissionState> {
        let mut permission = self.permission.lock().unwrap_or_else(|e| e.into_inner());
        *permission = self.answer;
        Ok(self.answer)
    }

    async fn show(&self, title: &str, body: &str, tag: &str) -> AppResult<()> {
        info!(tag = %tag, "🔔 {}: {}", title, body);
        Ok(())
    }
}

/// An alert captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownAlert {
    /// Alert title.
    pub title: String,
    /// Alert body.
    pub body: String,
    /// Replacement tag.
    pub tag: String,
}

/// Notifier that records what it was asked to do.
#[derive(Debug)]
pub struct RecordingNotifier {
    permission: Mutex<PermissionState>,
    answer: PermissionState,
    requests: AtomicUsize,
    fail_show: AtomicBool,
    shown: Mutex<Vec<ShownAlert>>,
}

impl RecordingNotifier {
    /// Create a notifier that starts at `permission` and answers prompts
    /// with `answer`.
    pub fn new(permission: PermissionState, answer: PermissionState) -> Self {
        Self {
            permission: Mutex::new(permission),
            answer,
            requests: AtomicUsize::new(0),
            fail_show: AtomicBool::new(false),
            shown: Mutex::new(Vec::new()),
        }
    }

    /// Notifier that is already allowed to show alerts.
    pub fn granted() -> Self {
        Self::new(PermissionState::Granted, PermissionState::Granted)
    }

    /// Make `show` fail.
    pub fn fail_show(&self, fail: bool) {
        self.fail_show.store(fail, Ordering::SeqCst);
    }

    /// Number of permission prompts so far.
    pub fn permission_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Alerts shown so far.
    pub fn shown(&self) -> Vec<ShownAlert> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl OsNotifier for RecordingNotifier {
    fn permission(&self) -> PermissionState {
        *self.permission.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn request_permission(&self) -> AppResult<PermissionState> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut permission = self.permission.lock().unwrap_or_else(|e| e.into_inner());
        *permission = self.answer;
        Ok(self.answer)
    }

    async fn show(&self, title: &str, body: &str, tag: &str) -> AppResult<()> {
        if self.fail_show.load(Ordering::SeqCst) {
            return Err(AppError::permission("Injected show failure"));
        }
        self.shown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ShownAlert {
                title: title.to_string(),
                body: body.to_string(),
                tag: tag.to_string(),
            });
        Ok(())
    }
}
