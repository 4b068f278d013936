use sqlx::{SqliteConnection, SqlitePool};
use time::OffsetDateTime;

#[derive(Clone)]
pub struct ProgressRepository {
    pool: SqlitePool,
}

impl ProgressRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 完了済みタスクIDの一覧
    pub async fn completed_task_ids(&self, user_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT task_id
            FROM user_progress
            WHERE user_id = $1
            ORDER BY task_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// タスクを完了済みにする（トランザクション内）
    ///
    /// 既に完了済みなら何もしない
    pub async fn mark_completed_in(
        conn: &mut SqliteConnection,
        user_id: i64,
        task_id: i64,
        completed_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_progress (user_id, task_id, completed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, task_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(task_id)
        .bind(completed_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
