//! Documents and batched writes exchanged with the document store.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;

/// A document read from a collection: its id plus a JSON object body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document id, unique within its collection.
    pub id: String,
    /// Field data. Always a JSON object.
    pub data: serde_json::Value,
}

impl Document {
    /// Create a document.
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Read a top-level field.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.data.get(name)
    }

    /// Deserialize the body into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            AppError::with_source(
                crate::error::ErrorKind::Serialization,
                format!("Malformed document '{}': {e}", self.id),
                e,
            )
        })
    }
}

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or replace a document.
    Set {
        /// Target collection.
        collection: String,
        /// Target document id.
        id: String,
        /// Full document body.
        data: serde_json::Value,
    },
    /// Merge fields into an existing document. Fails if it does not exist.
    Update {
        /// Target collection.
        collection: String,
        /// Target document id.
        id: String,
        /// Fields to overwrite.
        patch: serde_json::Value,
    },
}

impl WriteOp {
    /// Collection targeted by this write.
    pub fn collection(&self) -> &str {
        match self {
            Self::Set { collection, .. } | Self::Update { collection, .. } => collection,
        }
    }
}

/// An atomic group of writes: either all apply or none do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a create-or-replace.
    pub fn set(&mut self, collection: &str, id: &str, data: serde_json::Value) -> &mut Self {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
        self
    }

    /// Queue a field merge.
    pub fn update(&mut self, collection: &str, id: &str, patch: serde_json::Value) -> &mut Self {
        self.ops.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            patch,
        });
        self
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch has no writes.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Queued writes in insertion order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consume the batch.
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}
