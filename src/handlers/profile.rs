use axum::{Json, extract::State};

use crate::error::AppError;
use crate::extractors::Principal;
use crate::models::{ProfileUpdate, UserProfile};
use crate::services::Requirement;
use crate::state::AppState;

/// GET /api/profile
pub async fn get_profile(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<UserProfile>, AppError> {
    let user = state
        .access_service
        .authorize(principal.user_id, Requirement::Active)
        .await?;

    Ok(Json(UserProfile::self_view(&user)))
}

/// PUT /api/profile
///
/// 空文字・未指定のフィールドは変更しない
///
/// # Security
/// - パスワードはログに出力しない
pub async fn update_profile(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, AppError> {
    let user = state
        .access_service
        .authorize(principal.user_id, Requirement::Active)
        .await?;

    let updated = state.auth_service.update_profile(user.id, request).await?;

    Ok(Json(UserProfile::self_view(&updated)))
}
