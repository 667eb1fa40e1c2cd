use axum::{extract::State, Extension, Json};

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{CurrentUser, LoginRequest, LoginResponse, RegisterRequest, User, UserResponse};
use crate::services::AuthService;
use crate::AppState;

/// Register a new user
/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let user = AuthService::register(&state.db, req).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// Login user
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>> {
    let response = AuthService::login(&state.db, &state.config, req).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Current user profile
/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&current_user.id)
        .fetch_optional(state.db.pool())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(ApiResponse::success(UserResponse::from(user))))
}
