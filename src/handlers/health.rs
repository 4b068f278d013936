use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::AppState;

/// ヘルスチェックレスポンス
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// ヘルスチェックハンドラー
///
/// GET /api/health
///
/// データベースに到達できない場合は status = "degraded" を返す。
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let reachable = state
        .db
        .with_deadline("health_check", sqlx::query("SELECT 1").execute(state.db.pool()))
        .await
        .is_ok();

    if !reachable {
        tracing::warn!("ヘルスチェック: データベースに到達できない");
    }

    Json(HealthResponse {
        status: if reachable { "ok" } else { "degraded" },
        database: if reachable { "up" } else { "down" },
        version: env!("CARGO_PKG_VERSION"),
    })
}
