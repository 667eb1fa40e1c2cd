use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Member role within a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Admin,
    Editor,
    Viewer,
}

impl WorkspaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceRole::Admin => "admin",
            WorkspaceRole::Editor => "editor",
            WorkspaceRole::Viewer => "viewer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(WorkspaceRole::Admin),
            "editor" => Some(WorkspaceRole::Editor),
            "viewer" => Some(WorkspaceRole::Viewer),
            _ => None,
        }
    }

    /// put / delete
    pub fn can_write(&self) -> bool {
        matches!(self, WorkspaceRole::Admin | WorkspaceRole::Editor)
    }

    /// workspace settings and membership
    pub fn can_manage(&self) -> bool {
        matches!(self, WorkspaceRole::Admin)
    }
}

/// Workspace model
#[derive(Debug, Clone, FromRow)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub quota_bytes: i64,
    pub used_bytes: i64,
    pub max_file_bytes: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Workspace membership row
#[derive(Debug, Clone, FromRow)]
pub struct WorkspaceMember {
    pub workspace_id: String,
    pub user_id: String,
    pub role: String,
    pub created_at: String,
}

impl WorkspaceMember {
    pub fn get_role(&self) -> Option<WorkspaceRole> {
        WorkspaceRole::from_str(&self.role)
    }
}

/// Workspace response
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceResponse {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub quota_bytes: i64,
    pub used_bytes: i64,
    pub max_file_bytes: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Workspace> for WorkspaceResponse {
    fn from(ws: Workspace) -> Self {
        Self {
            id: ws.id,
            name: ws.name,
            owner_id: ws.owner_id,
            quota_bytes: ws.quota_bytes,
            used_bytes: ws.used_bytes,
            max_file_bytes: ws.max_file_bytes,
            created_at: ws.created_at,
            updated_at: ws.updated_at,
        }
    }
}

/// Workspace detail with usage summary
#[derive(Debug, Serialize)]
pub struct WorkspaceDetailResponse {
    #[serde(flatten)]
    pub workspace: WorkspaceResponse,
    pub file_count: i64,
    pub role: String,
}

/// Member with resolved username
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MemberResponse {
    pub user_id: String,
    pub username: String,
    pub role: String,
    pub created_at: String,
}

/// Create workspace request
#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    pub quota_bytes: Option<i64>,
    pub max_file_bytes: Option<i64>,
}

/// Update workspace request
#[derive(Debug, Deserialize)]
pub struct UpdateWorkspaceRequest {
    pub name: Option<String>,
    pub quota_bytes: Option<i64>,
    pub max_file_bytes: Option<i64>,
}

/// Add or update member request
#[derive(Debug, Deserialize)]
pub struct UpsertMemberRequest {
    pub role: String,
}

/// Workspace delete query parameters
#[derive(Debug, Deserialize)]
pub struct DeleteWorkspaceQuery {
    /// Soft-delete remaining files instead of refusing
    #[serde(default)]
    pub force: bool,
}
