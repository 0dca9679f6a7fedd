//! # lumen-store
//!
//! In-process implementations of the `lumen-core` boundary traits:
//!
//! - [`MemoryDocumentStore`]: live-querying document store with atomic batches
//! - [`MemoryLocalStore`] and [`FileLocalStore`]: local key-value storage
//! - [`TracingNotifier`] and [`RecordingNotifier`]: OS alert surfaces
//! - [`ManualClock`]: deterministic time source

pub mod clock;
pub mod file;
pub mod memory;
pub mod notifier;

pub use clock::ManualClock;
pub use file::FileLocalStore;
pub use memory::document::MemoryDocumentStore;
pub use memory::local::MemoryLocalStore;
pub use notifier::{RecordingNotifier, ShownAlert, TracingNotifier};
