//! Local durable key-value store trait.

use async_trait::async_trait;

use crate::result::AppResult;

/// String key-value storage that survives restarts of the host process.
#[async_trait]
pub trait LocalStore: Send + Sync + std::fmt::Debug + 'static {
    /// Read a value. Returns `None` if the key is absent.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> AppResult<()>;
}
