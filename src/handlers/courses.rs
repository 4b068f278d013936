use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::error::AppError;
use crate::extractors::Principal;
use crate::models::{Course, UserProgress};
use crate::services::Requirement;
use crate::state::AppState;

/// GET /api/courses
///
/// 全コース（タスク数付き）
pub async fn list_courses(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<Course>>, AppError> {
    state
        .access_service
        .authorize(principal.user_id, Requirement::Active)
        .await?;

    let courses = state.catalog_service.courses().await?;
    Ok(Json(courses))
}

/// GET /api/courses/{id}
pub async fn get_course(
    State(state): State<AppState>,
    principal: Principal,
    Path(course_id): Path<i64>,
) -> Result<Json<Course>, AppError> {
    state
        .access_service
        .authorize(principal.user_id, Requirement::Active)
        .await?;

    let course = state.catalog_service.course_by_id(course_id).await?;
    Ok(Json(course))
}

/// GET /api/progress
pub async fn get_progress(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<UserProgress>, AppError> {
    let user = state
        .access_service
        .authorize(principal.user_id, Requirement::Active)
        .await?;

    let progress = state.catalog_service.user_progress(user.id).await?;
    Ok(Json(progress))
}

/// POST /api/progress/tasks/{task_id}
///
/// 完了済みのタスクを再度完了しても成功を返す
pub async fn complete_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(task_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let user = state
        .access_service
        .authorize(principal.user_id, Requirement::Active)
        .await?;

    state.catalog_service.complete_task(user.id, task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
