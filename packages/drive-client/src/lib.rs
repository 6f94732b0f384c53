//! Minimal Google Drive v3 REST client.
//!
//! Scoped to a single parent folder: look up a file by exact name, download
//! its content, create a new file, and replace the content of an existing
//! one. Token acquisition and refresh are the caller's concern; the client
//! only sends the bearer token it was given.
//!
//! # Example
//!
//! ```rust,ignore
//! use drive_client::DriveClient;
//!
//! let client = DriveClient::new(token, folder_id);
//!
//! if let Some(file) = client.find_file("Ticket_Trong_Gio.parquet").await? {
//!     let bytes = client.download(&file.id).await?;
//!     client.update_content(&file.id, bytes).await?;
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{DriveError, Result};
pub use types::DriveFile;

use bytes::{BufMut, Bytes, BytesMut};
use types::{CreateFileRequest, FileList};

const API_URL: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

/// Content type used for uploaded objects.
const OCTET_STREAM: &str = "application/octet-stream";

pub struct DriveClient {
    client: reqwest::Client,
    token: String,
    folder_id: String,
}

impl DriveClient {
    pub fn new(token: String, folder_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            folder_id,
        }
    }

    /// Folder every lookup and creation is scoped to.
    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    /// Find a non-trashed file with exactly this name in the folder.
    ///
    /// When several files share the name, the first one listed wins.
    pub async fn find_file(&self, name: &str) -> Result<Option<DriveFile>> {
        let query = format!(
            "name = '{}' and '{}' in parents and trashed = false",
            escape_query_literal(name),
            escape_query_literal(&self.folder_id)
        );

        let resp = self
            .client
            .get(format!("{}/files", API_URL))
            .bearer_auth(&self.token)
            .query(&[("q", query.as_str()), ("fields", "files(id,name)")])
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let list: FileList = resp.json().await?;

        tracing::debug!(name, matches = list.files.len(), "Drive lookup");
        Ok(list.files.into_iter().next())
    }

    /// Download the full content of a file.
    pub async fn download(&self, file_id: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get(format!("{}/files/{}", API_URL, file_id))
            .bearer_auth(&self.token)
            .query(&[("alt", "media")])
            .send()
            .await?;

        let resp = check_status(resp).await?;
        Ok(resp.bytes().await?)
    }

    /// Create a file in the folder with its content in one multipart upload.
    ///
    /// Metadata and media travel in the same request, so a failed upload
    /// never leaves an empty file behind.
    pub async fn create_file(&self, name: &str, content: Bytes) -> Result<DriveFile> {
        let request = CreateFileRequest {
            name: name.to_string(),
            parents: vec![self.folder_id.clone()],
            mime_type: OCTET_STREAM.to_string(),
        };
        let metadata = serde_json::to_vec(&request)?;
        let size = content.len();
        let boundary = boundary_for(&content);
        let body = multipart_related(&boundary, &metadata, &content);

        let resp = self
            .client
            .post(format!("{}/files", UPLOAD_URL))
            .bearer_auth(&self.token)
            .query(&[("uploadType", "multipart"), ("fields", "id,name")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let file: DriveFile = resp.json().await?;

        tracing::info!(name, file_id = %file.id, bytes = size, "Created Drive file");
        Ok(file)
    }

    /// Replace the content of an existing file.
    pub async fn update_content(&self, file_id: &str, content: Bytes) -> Result<()> {
        let size = content.len();
        let resp = self
            .client
            .patch(format!("{}/files/{}", UPLOAD_URL, file_id))
            .bearer_auth(&self.token)
            .query(&[("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, OCTET_STREAM)
            .body(content)
            .send()
            .await?;

        check_status(resp).await?;
        tracing::debug!(file_id, bytes = size, "Uploaded Drive content");
        Ok(())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(DriveError::Api {
        status: status.as_u16(),
        message: body,
    })
}

/// A multipart boundary that does not occur in `content`.
fn boundary_for(content: &[u8]) -> String {
    (0u32..)
        .map(|n| format!("drive_client_part_{}", n))
        .find(|b| !content.windows(b.len()).any(|w| w == b.as_bytes()))
        .unwrap_or_default()
}

/// `multipart/related` body: JSON metadata part, then the media part.
fn multipart_related(boundary: &str, metadata: &[u8], content: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(metadata.len() + content.len() + 4 * boundary.len() + 128);
    body.put_slice(format!("--{}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n", boundary).as_bytes());
    body.put_slice(metadata);
    body.put_slice(format!("\r\n--{}\r\nContent-Type: {}\r\n\r\n", boundary, OCTET_STREAM).as_bytes());
    body.put_slice(content);
    body.put_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body.freeze()
}

/// Escape a value for use inside a single-quoted Drive query literal.
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
