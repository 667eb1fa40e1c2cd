use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// File record. `backend_key` and `backend_type` locate the object; the key
/// is opaque outside the backend adapter that wrote it.
#[derive(Debug, Clone, FromRow)]
pub struct FileRecord {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub backend_key: String,
    pub backend_type: String,
    pub size: i64,
    pub checksum: String,
    pub content_type: Option<String>,
    pub version: i64,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl FileRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// File response; the backend key stays internal
#[derive(Debug, Clone, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub backend_type: String,
    pub size: i64,
    pub checksum: String,
    pub content_type: Option<String>,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        Self {
            id: file.id,
            workspace_id: file.workspace_id,
            name: file.name,
            backend_type: file.backend_type,
            size: file.size,
            checksum: file.checksum,
            content_type: file.content_type,
            version: file.version,
            created_at: file.created_at,
            updated_at: file.updated_at,
        }
    }
}

/// File list page
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileResponse>,
    /// Name to resume after; absent on the last page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// File list query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListFilesQuery {
    pub prefix: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Upload query parameters
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub overwrite: bool,
}

/// Signed URL query parameters
#[derive(Debug, Deserialize)]
pub struct SignedUrlQuery {
    /// Validity in seconds
    pub expires: Option<u64>,
}

/// Signed URL response
#[derive(Debug, Serialize)]
pub struct SignedUrlResponse {
    pub url: String,
    pub expires_in: u64,
}

/// Upload intent journal row: a tentative backend key plus the quota it
/// holds reserved. Removed when the upload commits, compensates, or the
/// sweep reclaims it.
#[derive(Debug, Clone, FromRow)]
pub struct UploadIntent {
    pub id: String,
    pub workspace_id: String,
    pub file_id: String,
    pub backend_key: String,
    pub backend_type: String,
    pub size: i64,
    pub created_at: String,
}
