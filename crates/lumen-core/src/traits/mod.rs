//! Boundary traits defined in `lumen-core` and implemented by other crates.

pub mod clock;
pub mod document_store;
pub mod local_store;
pub mod navigator;
pub mod notifier;

pub use clock::{Clock, SystemClock};
pub use document_store::{DocumentStore, Snapshot, Subscription};
pub use local_store::LocalStore;
pub use navigator::Navigator;
pub use notifier::{OsNotifier, PermissionState};
