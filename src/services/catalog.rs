use time::OffsetDateTime;

use crate::db::Database;
use crate::error::AppError;
use crate::models::{Course, UserProgress};
use crate::repositories::{CourseRepository, ProgressRepository};

/// コース・学習進捗サービス
#[derive(Clone)]
pub struct CatalogService {
    db: Database,
    course_repo: CourseRepository,
    progress_repo: ProgressRepository,
}

impl CatalogService {
    pub fn new(db: Database) -> Self {
        let course_repo = CourseRepository::new(db.pool().clone());
        let progress_repo = ProgressRepository::new(db.pool().clone());
        Self {
            db,
            course_repo,
            progress_repo,
        }
    }

    /// 全コース（タスク数付き、タスク本体は含まない）
    pub async fn courses(&self) -> Result<Vec<Course>, AppError> {
        self.db
            .with_deadline("get_courses", self.course_repo.list_with_task_counts())
            .await
    }

    /// コースとタスク一覧を1つのスナップショットとして取得
    ///
    /// タスクは order 昇順
    pub async fn course_by_id(&self, course_id: i64) -> Result<Course, AppError> {
        self.db
            .transaction("get_course_by_id", move |conn| {
                Box::pin(async move {
                    let mut course = CourseRepository::find_with_task_count_in(conn, course_id)
                        .await?
                        .ok_or(AppError::CourseNotFound)?;
                    course.tasks = CourseRepository::list_tasks_in(conn, course_id).await?;
                    Ok(course)
                })
            })
            .await
    }

    /// ユーザーの学習進捗（完了なしなら空）
    pub async fn user_progress(&self, user_id: i64) -> Result<UserProgress, AppError> {
        let task_ids = self
            .db
            .with_deadline(
                "get_user_progress",
                self.progress_repo.completed_task_ids(user_id),
            )
            .await?;

        Ok(UserProgress::from_task_ids(user_id, task_ids))
    }

    /// タスクを完了済みにする（冪等）
    pub async fn complete_task(&self, user_id: i64, task_id: i64) -> Result<(), AppError> {
        let completed_at = OffsetDateTime::now_utc();

        self.db
            .transaction("complete_task", move |conn| {
                Box::pin(async move {
                    if !CourseRepository::task_exists_in(conn, task_id).await? {
                        return Err(AppError::TaskNotFound);
                    }
                    ProgressRepository::mark_completed_in(conn, user_id, task_id, completed_at)
                        .await?;
                    Ok(())
                })
            })
            .await?;

        tracing::info!(user_id = %user_id, task_id = %task_id, "タスク完了");
        Ok(())
    }
}
