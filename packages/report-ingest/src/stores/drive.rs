//! Google Drive folder store.

use async_trait::async_trait;
use bytes::Bytes;
use drive_client::DriveClient;

use crate::error::StoreResult;
use crate::traits::{DatasetStore, ObjectId};

/// Objects are files in one Drive folder; the object id is the Drive file id.
pub struct DriveStore {
    client: DriveClient,
}

impl DriveStore {
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DatasetStore for DriveStore {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<ObjectId>> {
        let file = self.client.find_file(name).await?;
        Ok(file.map(|f| ObjectId::new(f.id)))
    }

    async fn read(&self, id: &ObjectId) -> StoreResult<Bytes> {
        Ok(self.client.download(id.as_str()).await?)
    }

    async fn create(&self, name: &str, content: Bytes) -> StoreResult<ObjectId> {
        let file = self.client.create_file(name, content).await?;
        Ok(ObjectId::new(file.id))
    }

    async fn update(&self, id: &ObjectId, content: Bytes) -> StoreResult<()> {
        self.client.update_content(id.as_str(), content).await?;
        tracing::info!(file_id = %id, "Updated Drive dataset");
        Ok(())
    }
}
