use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreResult;

/// Opaque store-assigned identity of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named byte objects with no transactional guarantees.
///
/// Names are unique per adapter. Every failure here is a connectivity or
/// authorization fault from the caller's point of view.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<ObjectId>>;

    async fn read(&self, id: &ObjectId) -> StoreResult<Bytes>;

    async fn create(&self, name: &str, content: Bytes) -> StoreResult<ObjectId>;

    /// Replace the content of an existing object.
    async fn update(&self, id: &ObjectId, content: Bytes) -> StoreResult<()>;
}
