//! Shared types: typed identifiers, documents, and queries.

pub mod document;
pub mod id;
pub mod query;

pub use document::{Document, WriteBatch, WriteOp};
pub use id::{ClassId, NotificationId, UserId};
pub use query::{FieldValue, Filter, OrderBy, Query, SortDirection};
