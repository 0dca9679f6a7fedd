//! In-memory backends.

pub mod document;
pub mod local;
mod matcher;
