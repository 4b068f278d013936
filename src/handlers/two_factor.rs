use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::Principal;
use crate::handlers::login::validate_otp_code;
use crate::services::Requirement;
use crate::state::AppState;

// === 2FA Enable ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableResponse {
    /// 確認コードの送信先
    pub sent_to: String,
}

/// POST /api/2fa/enable
///
/// 2FA有効化を開始（確認コードをメール送信）
///
/// # Security
/// - コード平文はログ出力禁止
pub async fn enable_2fa(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<EnableResponse>, AppError> {
    let user = state
        .access_service
        .authorize(principal.user_id, Requirement::Active)
        .await?;

    if user.is_2fa_enabled {
        return Err(AppError::Conflict("2fa_already_enabled".to_string()));
    }

    let code = state.otp_service.issue_code(user.id).await?;
    state.email_service.send_otp_code(&user, &code).await?;

    tracing::info!(user_id = %user.id, "2FA設定開始");

    Ok(Json(EnableResponse {
        sent_to: user.email,
    }))
}

// === 2FA Confirm ===

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub is_2fa_enabled: bool,
}

/// POST /api/2fa/confirm
///
/// 確認コードを検証し2FAを有効化
///
/// 2FA有効済みのユーザーが持つチャレンジはログイン用のため受け付けない
pub async fn confirm_2fa(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, AppError> {
    validate_otp_code(&request.code)?;

    let user = state
        .access_service
        .authorize(principal.user_id, Requirement::Active)
        .await?;

    if user.is_2fa_enabled {
        return Err(AppError::Conflict("2fa_already_enabled".to_string()));
    }

    if !state.otp_service.verify_code(user.id, &request.code).await? {
        return Err(AppError::Unauthorized("invalid_otp".to_string()));
    }

    state.otp_service.clear_code(user.id).await?;
    state.otp_service.enable_2fa(user.id).await?;

    Ok(Json(ConfirmResponse {
        is_2fa_enabled: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{new_user, test_state};

    #[tokio::test]
    async fn test_enable_then_confirm() {
        let state = test_state().await;
        let user = state
            .auth_service
            .create_user(new_user("alice", "a@x.com"))
            .await
            .unwrap();
        let principal = Principal { user_id: user.id };

        let Json(response) = enable_2fa(State(state.clone()), principal).await.unwrap();
        assert_eq!(response.sent_to, "a@x.com");

        state.otp_service.save_code(user.id, "111111").await.unwrap();

        let err = confirm_2fa(
            State(state.clone()),
            principal,
            Json(ConfirmRequest {
                code: "222222".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let Json(response) = confirm_2fa(
            State(state.clone()),
            principal,
            Json(ConfirmRequest {
                code: "111111".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(response.is_2fa_enabled);

        let reloaded = state.auth_service.find_user(user.id).await.unwrap();
        assert!(reloaded.is_2fa_enabled);
        assert!(reloaded.otp_challenge().is_none());

        let err = enable_2fa(State(state), principal).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_confirm_rejects_login_code() {
        let state = test_state().await;
        let user = state
            .auth_service
            .create_user(new_user("alice", "a@x.com"))
            .await
            .unwrap();
        state.otp_service.enable_2fa(user.id).await.unwrap();

        // ログイン時に発行されたコード
        state.otp_service.save_code(user.id, "333333").await.unwrap();

        let err = confirm_2fa(
            State(state.clone()),
            Principal { user_id: user.id },
            Json(ConfirmRequest {
                code: "333333".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // ログイン用のコードは残っている
        assert!(state.otp_service.verify_code(user.id, "333333").await.unwrap());
    }

    #[tokio::test]
    async fn test_confirm_rejects_malformed_code() {
        let state = test_state().await;
        let err = confirm_2fa(
            State(state),
            Principal { user_id: 1 },
            Json(ConfirmRequest {
                code: "abc".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
