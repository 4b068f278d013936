use axum::{Json, extract::State};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{User, UserProfile};
use crate::services::Requirement;
use crate::state::AppState;

/// ログインリクエスト
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[garde(length(min = 1, max = 50))]
    pub username: String,
    #[garde(length(min = 1, max = 128))]
    pub password: String,
}

/// OTPによるログイン完了リクエスト
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpLoginRequest {
    pub user_id: i64,
    pub code: String,
}

/// ログインレスポンス
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// 2FAが必要かどうか
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_2fa: Option<bool>,
    /// ユーザーID（2FA必要時に返却）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// ログイン完了時のユーザー情報
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

impl LoginResponse {
    fn challenge(user_id: i64) -> Self {
        Self {
            requires_2fa: Some(true),
            user_id: Some(user_id),
            user: None,
        }
    }

    fn completed(user: &User) -> Self {
        Self {
            requires_2fa: None,
            user_id: None,
            user: Some(UserProfile::self_view(user)),
        }
    }
}

/// ログインハンドラー
///
/// POST /api/login
///
/// 処理フロー:
/// 1. リクエストバリデーション
/// 2. ユーザー認証（DB照合）
/// 3. 2FA有効ならOTPを発行して requires2fa: true を返却
/// 4. 2FA無効なら最終ログイン日時を記録してユーザー情報を返却
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    // 1. リクエストバリデーション
    request.validate()?;

    // 2. ユーザー認証（DB照合）
    let user = state
        .auth_service
        .authenticate(&request.username, &request.password)
        .await?;

    // 3. 2FA有効チェック
    if user.is_2fa_enabled {
        let code = state.otp_service.issue_code(user.id).await?;
        state.email_service.send_otp_code(&user, &code).await?;

        return Ok(Json(LoginResponse::challenge(user.id)));
    }

    // 4. ログイン完了
    state.auth_service.record_login(user.id).await;

    Ok(Json(LoginResponse::completed(&user)))
}

/// OTPログインハンドラー
///
/// POST /api/login/otp
///
/// # Security
/// - コードはログ出力禁止
/// - ユーザー不在・2FA未有効・コード不一致・期限切れは同じエラーを返す
/// - 2FA未有効のユーザーのチャレンジ（有効化確認用）はログインに使えない
pub async fn login_otp(
    State(state): State<AppState>,
    Json(request): Json<OtpLoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_otp_code(&request.code)?;

    let user = match state.auth_service.find_user(request.user_id).await {
        Ok(user) => Some(user),
        Err(AppError::UserNotFound) => None,
        Err(e) => return Err(e),
    };

    // ユーザーの状態にかかわらず照合は必ず行う
    let verified = state
        .otp_service
        .verify_code(request.user_id, &request.code)
        .await?;

    let Some(user) = user.filter(|u| u.is_2fa_enabled && verified) else {
        return Err(AppError::Unauthorized("invalid_otp".to_string()));
    };

    state.otp_service.clear_code(user.id).await?;

    if !Requirement::Active.is_satisfied_by(&user) {
        tracing::warn!(user_id = %user.id, "OTPログイン失敗: 無効化されたアカウント");
        return Err(AppError::Forbidden("account_inactive".to_string()));
    }

    state.auth_service.record_login(user.id).await;

    tracing::info!(user_id = %user.id, "OTPログイン完了");

    Ok(Json(LoginResponse::completed(&user)))
}

/// OTPコードバリデーション
pub(crate) fn validate_otp_code(code: &str) -> Result<(), AppError> {
    if code.is_empty() {
        return Err(AppError::Validation("認証コードは必須です".to_string()));
    }
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "認証コードは6桁の数字で入力してください".to_string(),
        ));
    }
    Ok(())
}
