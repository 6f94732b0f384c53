//! Directory of snapshot files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{StoreError, StoreResult};
use crate::traits::{DatasetStore, ObjectId};

/// Stores each object as a file named after it. The object id is the file
/// name.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> StoreResult<PathBuf> {
        // Names are flat; refuse anything that would leave the directory.
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(StoreError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.root.join(name))
    }

    /// Write through a temporary file so readers never see a partial snapshot.
    async fn write_atomic(&self, path: &Path, content: &[u8]) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl DatasetStore for LocalStore {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<ObjectId>> {
        let path = self.path_of(name)?;
        if tokio::fs::try_exists(&path).await? {
            Ok(Some(ObjectId::new(name)))
        } else {
            Ok(None)
        }
    }

    async fn read(&self, id: &ObjectId) -> StoreResult<Bytes> {
        let path = self.path_of(id.as_str())?;
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound { id: id.to_string() })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn create(&self, name: &str, content: Bytes) -> StoreResult<ObjectId> {
        let path = self.path_of(name)?;
        if tokio::fs::try_exists(&path).await? {
            return Err(StoreError::AlreadyExists {
                name: name.to_string(),
            });
        }

        self.write_atomic(&path, &content).await?;
        tracing::info!(path = %path.display(), bytes = content.len(), "Created local dataset");
        Ok(ObjectId::new(name))
    }

    async fn update(&self, id: &ObjectId, content: Bytes) -> StoreResult<()> {
        let path = self.path_of(id.as_str())?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(StoreError::NotFound { id: id.to_string() });
        }

        self.write_atomic(&path, &content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_store_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("datasets"));

        assert_eq!(store.find_by_name("Miss_Call.parquet").await.unwrap(), None);

        let id = store
            .create("Miss_Call.parquet", Bytes::from_static(b"v1"))
            .await
            .unwrap();
        assert_eq!(id.as_str(), "Miss_Call.parquet");
        assert_eq!(store.find_by_name("Miss_Call.parquet").await.unwrap(), Some(id.clone()));

        store.update(&id, Bytes::from_static(b"v2")).await.unwrap();
        assert_eq!(store.read(&id).await.unwrap(), Bytes::from_static(b"v2"));
        assert!(!dir.path().join("datasets/Miss_Call.tmp").exists());
    }

    #[tokio::test]
    async fn test_local_store_rejects_bad_names_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        assert!(matches!(
            store.find_by_name("../escape.parquet").await,
            Err(StoreError::InvalidName { name }) if name == "../escape.parquet"
        ));
        assert!(matches!(
            store.read(&ObjectId::new("..")).await,
            Err(StoreError::InvalidName { .. })
        ));

        store.create("a.parquet", Bytes::new()).await.unwrap();
        assert!(matches!(
            store.create("a.parquet", Bytes::new()).await,
            Err(StoreError::AlreadyExists { .. })
        ));
        assert!(matches!(
            store.update(&ObjectId::new("b.parquet"), Bytes::new()).await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
