use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use bytes::Bytes;

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{
    CurrentUser, FileListResponse, FileResponse, ListFilesQuery, SignedUrlQuery,
    SignedUrlResponse, UploadQuery, WorkspaceRole,
};
use crate::services::{FileService, WorkspaceService};
use crate::AppState;

/// Upload a file into a workspace
/// POST /api/v1/workspaces/:id/files?overwrite=true
///
/// Multipart form: a `file` part carries the content; an optional `name`
/// text part overrides the part's filename as the stored name (this is how
/// clients place files under a path like `docs/readme.md`).
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let (workspace, _) =
        WorkspaceService::require_role(&state.db, &id, &current_user.id, WorkspaceRole::Editor)
            .await?;

    let mut data: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut explicit_name: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to process multipart: {}", e)))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                content_type = field.content_type().map(|s| s.to_string());
                data = Some(field.bytes().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read file content: {}", e))
                })?);
            }
            "name" => {
                let text = field.text().await.unwrap_or_default();
                if !text.is_empty() {
                    explicit_name = Some(text);
                }
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;
    let name = explicit_name
        .or(file_name)
        .ok_or_else(|| AppError::BadRequest("No file name provided".to_string()))?;

    let file = FileService::upload(
        &state.db,
        &state.storage,
        &workspace,
        &current_user.id,
        &name,
        content_type,
        data,
        query.overwrite,
    )
    .await?;

    Ok(Json(ApiResponse::success(file)))
}

/// List files in a workspace
/// GET /api/v1/workspaces/:id/files?prefix=docs/&cursor=xxx&limit=100
pub async fn list_files(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<ApiResponse<FileListResponse>>> {
    let (workspace, _) =
        WorkspaceService::require_role(&state.db, &id, &current_user.id, WorkspaceRole::Viewer)
            .await?;

    let files = FileService::list(&state.db, &workspace, &current_user.id, &query).await?;
    Ok(Json(ApiResponse::success(files)))
}

/// Get file metadata
/// GET /api/v1/workspaces/:id/files/:file_id
pub async fn get_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, file_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let (workspace, _) =
        WorkspaceService::require_role(&state.db, &id, &current_user.id, WorkspaceRole::Viewer)
            .await?;

    let file = FileService::get_metadata(&state.db, &workspace.id, &file_id).await?;
    Ok(Json(ApiResponse::success(file)))
}

/// Download file content through the server
/// GET /api/v1/workspaces/:id/files/:file_id/content
pub async fn download_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, file_id)): Path<(String, String)>,
) -> Result<Response> {
    let (workspace, _) =
        WorkspaceService::require_role(&state.db, &id, &current_user.id, WorkspaceRole::Viewer)
            .await?;

    let (record, data) =
        FileService::download(&state.db, &state.storage, &workspace, &current_user.id, &file_id)
            .await?;

    let content_type = record
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    // Names can carry path separators; browsers only want the final segment.
    let basename = record.name.rsplit('/').next().unwrap_or(&record.name);
    let fallback_name = basename.replace(['"', '\\'], "_");
    let encoded_name = urlencoding::encode(basename);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, data.len())
        .header(header::ETAG, format!("\"{}\"", record.checksum))
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"; filename*=UTF-8''{}",
                fallback_name, encoded_name
            ),
        )
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Get a time-limited download URL for a file
/// GET /api/v1/workspaces/:id/files/:file_id/url?expires=900
pub async fn get_download_url(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, file_id)): Path<(String, String)>,
    Query(query): Query<SignedUrlQuery>,
) -> Result<Json<ApiResponse<SignedUrlResponse>>> {
    let (workspace, _) =
        WorkspaceService::require_role(&state.db, &id, &current_user.id, WorkspaceRole::Viewer)
            .await?;

    let signed = FileService::download_url(
        &state.db,
        &state.storage,
        &workspace,
        &current_user.id,
        &file_id,
        query.expires,
    )
    .await?;

    Ok(Json(ApiResponse::success(signed)))
}

/// Soft-delete a file
/// DELETE /api/v1/workspaces/:id/files/:file_id
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, file_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let (workspace, _) =
        WorkspaceService::require_role(&state.db, &id, &current_user.id, WorkspaceRole::Editor)
            .await?;

    FileService::delete(&state.db, &workspace, &current_user.id, &file_id).await?;
    Ok(Json(ApiResponse::<()>::success_message("File deleted")))
}
