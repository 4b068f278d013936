use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::extractors::Principal;
use crate::models::UserProfile;
use crate::services::Requirement;
use crate::state::AppState;

/// ロールによる絞り込み
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoleFilter {
    Admin,
    User,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<RoleFilter>,
    /// ユーザー名・メールアドレス・氏名の部分一致
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub is_active: bool,
}

/// GET /api/admin/users
///
/// q（部分一致）と role は組み合わせて絞り込む
pub async fn list_users(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    state
        .access_service
        .authorize(principal.user_id, Requirement::Admin)
        .await?;

    let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let users = match (search, query.role) {
        (Some(q), Some(role)) => {
            state
                .access_service
                .search_users_by_role(q, role == RoleFilter::Admin)
                .await?
        }
        (Some(q), None) => state.access_service.search_users(q).await?,
        (None, Some(RoleFilter::Admin)) => state.access_service.users_by_role(true).await?,
        (None, Some(RoleFilter::User)) => state.access_service.users_by_role(false).await?,
        (None, None) => state.access_service.all_users().await?,
    };

    Ok(Json(users.iter().map(UserProfile::admin_view).collect()))
}

/// POST /api/admin/users/{id}/promote
pub async fn promote_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let admin = state
        .access_service
        .authorize(principal.user_id, Requirement::Admin)
        .await?;

    state.access_service.promote_to_admin(user_id).await?;

    tracing::info!(admin_id = %admin.id, target_id = %user_id, "管理者昇格を実行");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/users/{id}/demote
pub async fn demote_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let admin = state
        .access_service
        .authorize(principal.user_id, Requirement::Admin)
        .await?;

    state.access_service.demote_from_admin(user_id).await?;

    tracing::info!(admin_id = %admin.id, target_id = %user_id, "管理者降格を実行");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/admin/users/{id}/status
pub async fn update_user_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(user_id): Path<i64>,
    Json(request): Json<StatusRequest>,
) -> Result<StatusCode, AppError> {
    state
        .access_service
        .authorize(principal.user_id, Requirement::Admin)
        .await?;

    state
        .access_service
        .update_user_status(user_id, request.is_active)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
