use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Router の構築
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health_check))
        // 認証
        .route("/api/register", post(handlers::register))
        .route("/api/login", post(handlers::login))
        .route("/api/login/otp", post(handlers::login_otp))
        .route("/api/2fa/enable", post(handlers::enable_2fa))
        .route("/api/2fa/confirm", post(handlers::confirm_2fa))
        // プロフィール
        .route(
            "/api/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        // コース・進捗
        .route("/api/courses", get(handlers::list_courses))
        .route("/api/courses/{id}", get(handlers::get_course))
        .route("/api/progress", get(handlers::get_progress))
        .route(
            "/api/progress/tasks/{task_id}",
            post(handlers::complete_task),
        )
        // 管理者
        .route("/api/admin/users", get(handlers::list_users))
        .route(
            "/api/admin/users/{id}/promote",
            post(handlers::promote_user),
        )
        .route("/api/admin/users/{id}/demote", post(handlers::demote_user))
        .route(
            "/api/admin/users/{id}/status",
            put(handlers::update_user_status),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
