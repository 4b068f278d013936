use axum::{Json, extract::State, http::StatusCode};

use crate::error::AppError;
use crate::models::{NewUser, UserProfile};
use crate::state::AppState;

/// ユーザー登録ハンドラー
///
/// POST /api/register
///
/// # Security
/// - パスワードはログに出力しない
/// - パスワードは即座にハッシュ化
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<NewUser>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let user = state.auth_service.create_user(request).await?;

    Ok((StatusCode::CREATED, Json(UserProfile::self_view(&user))))
}
