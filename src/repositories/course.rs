use sqlx::{SqliteConnection, SqlitePool};

use crate::models::{Course, Task};

#[derive(Clone)]
pub struct CourseRepository {
    pool: SqlitePool,
}

impl CourseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 全コースをタスク数付きで取得（ID順）
    ///
    /// # Note
    /// tasks は空のまま返す
    pub async fn list_with_task_counts(&self) -> Result<Vec<Course>, sqlx::Error> {
        sqlx::query_as::<_, Course>(
            r#"
            SELECT c.id, c.vulnerability_type, c.description, COUNT(t.id) AS tasks_count
            FROM courses c
            LEFT JOIN tasks t ON t.course_id = c.id
            GROUP BY c.id, c.vulnerability_type, c.description
            ORDER BY c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// タスクの存在確認（トランザクション内）
    pub async fn task_exists_in(
        conn: &mut SqliteConnection,
        task_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(count > 0)
    }

    /// コースをタスク数付きで取得（トランザクション内）
    pub async fn find_with_task_count_in(
        conn: &mut SqliteConnection,
        course_id: i64,
    ) -> Result<Option<Course>, sqlx::Error> {
        sqlx::query_as::<_, Course>(
            r#"
            SELECT c.id, c.vulnerability_type, c.description, COUNT(t.id) AS tasks_count
            FROM courses c
            LEFT JOIN tasks t ON t.course_id = c.id
            WHERE c.id = $1
            GROUP BY c.id, c.vulnerability_type, c.description
            "#,
        )
        .bind(course_id)
        .fetch_optional(&mut *conn)
        .await
    }

    /// コースのタスクを task_order 昇順で取得（トランザクション内）
    pub async fn list_tasks_in(
        conn: &mut SqliteConnection,
        course_id: i64,
    ) -> Result<Vec<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"
            SELECT id, course_id, title, description, difficulty, task_order
            FROM tasks
            WHERE course_id = $1
            ORDER BY task_order, id
            "#,
        )
        .bind(course_id)
        .fetch_all(&mut *conn)
        .await
    }
}
