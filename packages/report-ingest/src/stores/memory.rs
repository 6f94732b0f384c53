//! In-memory dataset store for testing and dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{StoreError, StoreResult};
use crate::traits::{DatasetStore, ObjectId};

/// Store that keeps objects in a map.
///
/// Counts writes so tests can assert how many merges happened, and can be
/// switched offline to simulate a connectivity fault.
#[derive(Default)]
pub struct MemoryStore {
    names: RwLock<HashMap<String, ObjectId>>,
    objects: RwLock<HashMap<ObjectId, Bytes>>,
    next_id: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes under a name, bypassing the codec.
    pub fn insert_raw(&self, name: &str, content: Bytes) -> ObjectId {
        let id = self.allocate_id();
        self.names.write().unwrap().insert(name.to_string(), id.clone());
        self.objects.write().unwrap().insert(id.clone(), content);
        id
    }

    /// Make every subsequent call fail as if the store were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.read().unwrap().contains_key(name)
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Creates plus updates.
    pub fn write_count(&self) -> usize {
        self.create_count() + self.update_count()
    }

    fn allocate_id(&self) -> ObjectId {
        ObjectId::new(format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Remote("memory store is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DatasetStore for MemoryStore {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<ObjectId>> {
        self.check_online()?;
        Ok(self.names.read().unwrap().get(name).cloned())
    }

    async fn read(&self, id: &ObjectId) -> StoreResult<Bytes> {
        self.check_online()?;
        self.objects
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn create(&self, name: &str, content: Bytes) -> StoreResult<ObjectId> {
        self.check_online()?;
        if self.contains(name) {
            return Err(StoreError::AlreadyExists {
                name: name.to_string(),
            });
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(self.insert_raw(name, content))
    }

    async fn update(&self, id: &ObjectId, content: Bytes) -> StoreResult<()> {
        self.check_online()?;
        let mut objects = self.objects.write().unwrap();
        let slot = objects
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        *slot = content;
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_find_update() {
        let store = MemoryStore::new();
        let id = store.create("a.parquet", Bytes::from_static(b"1")).await.unwrap();

        assert_eq!(store.find_by_name("a.parquet").await.unwrap(), Some(id.clone()));
        assert_eq!(store.find_by_name("b.parquet").await.unwrap(), None);

        store.update(&id, Bytes::from_static(b"2")).await.unwrap();
        assert_eq!(store.read(&id).await.unwrap(), Bytes::from_static(b"2"));
        assert_eq!((store.create_count(), store.update_count()), (1, 1));
    }

    #[tokio::test]
    async fn test_duplicate_create_and_unknown_update_fail() {
        let store = MemoryStore::new();
        store.create("a.parquet", Bytes::new()).await.unwrap();

        assert!(matches!(
            store.create("a.parquet", Bytes::new()).await,
            Err(StoreError::AlreadyExists { .. })
        ));
        assert!(matches!(
            store.update(&ObjectId::new("nope"), Bytes::new()).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(store.find_by_name("a").await, Err(StoreError::Remote(_))));
    }
}
