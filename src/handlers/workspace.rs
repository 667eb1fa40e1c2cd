use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};

use crate::error::{ApiResponse, Result};
use crate::models::{
    CreateWorkspaceRequest, CurrentUser, DeleteWorkspaceQuery, MemberResponse,
    UpdateWorkspaceRequest, UpsertMemberRequest, WorkspaceDetailResponse, WorkspaceResponse,
};
use crate::services::WorkspaceService;
use crate::AppState;

/// Create a workspace owned by the current user
/// POST /api/v1/workspaces
pub async fn create_workspace(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<CreateWorkspaceRequest>,
) -> Result<Json<ApiResponse<WorkspaceResponse>>> {
    let workspace =
        WorkspaceService::create(&state.db, &state.config.workspace, &current_user.id, req).await?;
    Ok(Json(ApiResponse::success(workspace)))
}

/// List workspaces the current user is a member of
/// GET /api/v1/workspaces
pub async fn list_workspaces(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<WorkspaceResponse>>>> {
    let workspaces = WorkspaceService::list_for_user(&state.db, &current_user.id).await?;
    Ok(Json(ApiResponse::success(workspaces)))
}

/// Get a workspace with usage details
/// GET /api/v1/workspaces/:id
pub async fn get_workspace(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<WorkspaceDetailResponse>>> {
    let detail = WorkspaceService::get_detail(&state.db, &id, &current_user.id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Update workspace settings
/// PATCH /api/v1/workspaces/:id
pub async fn update_workspace(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateWorkspaceRequest>,
) -> Result<Json<ApiResponse<WorkspaceResponse>>> {
    let workspace = WorkspaceService::update(&state.db, &id, &current_user.id, req).await?;
    Ok(Json(ApiResponse::success(workspace)))
}

/// Delete a workspace; refuses while files remain unless force is set
/// DELETE /api/v1/workspaces/:id?force=true
pub async fn delete_workspace(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(query): Query<DeleteWorkspaceQuery>,
) -> Result<Json<ApiResponse<()>>> {
    WorkspaceService::delete(&state.db, &id, &current_user.id, query.force).await?;
    Ok(Json(ApiResponse::<()>::success_message("Workspace deleted")))
}

/// List workspace members with their roles
/// GET /api/v1/workspaces/:id/members
pub async fn list_members(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<MemberResponse>>>> {
    let members = WorkspaceService::list_members(&state.db, &id, &current_user.id).await?;
    Ok(Json(ApiResponse::success(members)))
}

/// Add a member or change their role
/// PUT /api/v1/workspaces/:id/members/:user_id
pub async fn upsert_member(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, user_id)): Path<(String, String)>,
    Json(req): Json<UpsertMemberRequest>,
) -> Result<Json<ApiResponse<MemberResponse>>> {
    let member =
        WorkspaceService::upsert_member(&state.db, &id, &current_user.id, &user_id, &req.role)
            .await?;
    Ok(Json(ApiResponse::success(member)))
}

/// Remove a member from a workspace
/// DELETE /api/v1/workspaces/:id/members/:user_id
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<()>>> {
    WorkspaceService::remove_member(&state.db, &id, &current_user.id, &user_id).await?;
    Ok(Json(ApiResponse::<()>::success_message("Member removed")))
}
