//! Notification type and urgency.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a notification is about. Drives icon and styling only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationType {
    /// A submitted activity was graded.
    ActivityCorrection,
    /// A new activity was posted.
    ActivityPost,
    /// A new module was posted.
    ModulePost,
    /// Platform message.
    #[default]
    System,
    /// Any other type string, kept verbatim.
    Other(String),
}

impl NotificationType {
    /// Parse from the stored string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "activity_correction" => Self::ActivityCorrection,
            "activity_post" => Self::ActivityPost,
            "module_post" => Self::ModulePost,
            "system" => Self::System,
            other => Self::Other(other.to_string()),
        }
    }

    /// Stored string form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ActivityCorrection => "activity_correction",
            Self::ActivityPost => "activity_post",
            Self::ModulePost => "module_post",
            Self::System => "system",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for NotificationType {
    fn from(s: String) -> Self {
        Self::from_str_value(&s)
    }
}

impl From<NotificationType> for String {
    fn from(kind: NotificationType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How pressing a notification is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Urgency {
    /// Background information.
    Low,
    /// Normal. Also the fallback for unknown values.
    #[default]
    Medium,
    /// Needs attention.
    High,
}

impl Urgency {
    /// Parse from the stored string. Unknown values map to `Medium`.
    pub fn from_str_value(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }

    /// Stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl From<String> for Urgency {
    fn from(s: String) -> Self {
        Self::from_str_value(&s)
    }
}

impl From<Urgency> for String {
    fn from(urgency: Urgency) -> Self {
        urgency.as_str().to_string()
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
