//! Query model for the document store: equality, greater-than, and
//! membership filters with an optional order and limit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::notifications::MAX_IN_FILTER_VALUES;
use crate::error::AppError;
use crate::result::AppResult;

/// A scalar value a filter compares against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// String.
    Str(String),
    /// Point in time. Matches RFC 3339 strings and epoch-millisecond numbers.
    Timestamp(DateTime<Utc>),
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

/// A predicate over one top-level field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// `field == value`
    Eq(String, FieldValue),
    /// `field > value`
    Gt(String, FieldValue),
    /// `field IN values`, at most [`MAX_IN_FILTER_VALUES`] values.
    In(String, Vec<FieldValue>),
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Ordering clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Field to sort on.
    pub field: String,
    /// Direction.
    pub direction: SortDirection,
}

/// A query against one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Target collection.
    pub collection: String,
    /// Conjunction of filters.
    pub filters: Vec<Filter>,
    /// Optional ordering.
    pub order_by: Option<OrderBy>,
    /// Optional result cap.
    pub limit: Option<usize>,
}

impl Query {
    /// Start a query on a collection.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Add an equality filter.
    pub fn where_eq(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    /// Add a greater-than filter.
    pub fn where_gt(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter::Gt(field.to_string(), value.into()));
        self
    }

    /// Add a membership filter.
    pub fn where_in<V: Into<FieldValue>>(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filters.push(Filter::In(
            field.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Order results.
    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    /// Cap the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check the query against the store's filter contract.
    pub fn validate(&self) -> AppResult<()> {
        for filter in &self.filters {
            if let Filter::In(field, values) = filter {
                if values.is_empty() {
                    return Err(AppError::validation(format!(
                        "IN filter on '{field}' needs at least one value"
                    )));
                }
                if values.len() > MAX_IN_FILTER_VALUES {
                    return Err(AppError::validation(format!(
                        "IN filter on '{field}' has {} values, limit is {MAX_IN_FILTER_VALUES}",
                        values.len()
                    )));
                }
            }
        }
        Ok(())
    }
}
