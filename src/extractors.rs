use axum::{extract::FromRequestParts, http::request::Parts};
use http::HeaderName;

use crate::error::AppError;

/// 上流の認証層が検証済みのユーザーIDを設定するヘッダー
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// 呼び出し元ユーザー
///
/// トークンの検証は上流で行われる。ここではIDを取り出すだけで、
/// ロール・アカウント状態の確認は各ハンドラーで `AccessService::authorize` を使う。
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub user_id: i64,
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(&USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .ok_or_else(|| AppError::Unauthorized("missing_principal".to_string()))?;

        Ok(Self { user_id })
    }
}
