use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// 呼び出し側（HTTP層）が区別すべきエラー分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Unauthorized,
    Forbidden,
    Validation,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("ユーザーが見つかりません")]
    UserNotFound,

    #[error("コースが見つかりません")]
    CourseNotFound,

    #[error("タスクが見つかりません")]
    TaskNotFound,

    #[error("競合エラー: {0}")]
    Conflict(String),

    #[error("認証エラー: {0}")]
    Unauthorized(String),

    #[error("権限エラー: {0}")]
    Forbidden(String),

    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("処理がタイムアウトしました: {0}")]
    DeadlineExceeded(&'static str),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound | Self::CourseNotFound | Self::TaskNotFound => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Database(_) | Self::DeadlineExceeded(_) | Self::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        Self::Validation(report.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::UserNotFound | Self::CourseNotFound | Self::TaskNotFound => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Unauthorized(reason) => {
                tracing::warn!(reason = %reason, "認証失敗");
                // どの要素で失敗したかは応答に含めない
                (StatusCode::UNAUTHORIZED, "認証に失敗しました".to_string())
            }
            Self::Forbidden(reason) => {
                tracing::warn!(reason = %reason, "権限不足");
                (
                    StatusCode::FORBIDDEN,
                    "この操作を行う権限がありません".to_string(),
                )
            }
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::DeadlineExceeded(operation) => {
                tracing::error!(operation = %operation, "処理タイムアウト");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "処理がタイムアウトしました".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
