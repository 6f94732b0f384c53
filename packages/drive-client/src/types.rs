use serde::{Deserialize, Serialize};

/// File metadata as returned by `files.list` / `files.create`.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Response of `files.list`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
}

/// Metadata body for `files.create`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateFileRequest {
    pub name: String,
    pub parents: Vec<String>,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}
