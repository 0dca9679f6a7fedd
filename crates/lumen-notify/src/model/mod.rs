//! Notification model: the normalized display shape, its enumerations, and
//! the stored record layouts it is decoded from.

pub mod deep_link;
pub mod instant;
pub mod kind;
pub mod notification;
pub mod record;

pub use deep_link::DeepLink;
pub use kind::{NotificationType, Urgency};
pub use notification::{Notification, NotificationSource};
pub use record::{BroadcastRecord, PrivateRecord};
