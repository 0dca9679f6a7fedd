//! # lumen-core
//!
//! Core crate for Lumen. Contains the unified error system, configuration
//! schemas, typed identifiers, the document/query model spoken by the
//! backend, and the boundary traits the notification subsystem talks to.
//!
//! This crate has **no** internal dependencies on other Lumen crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
