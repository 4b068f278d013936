use serde::Serialize;
use sqlx::FromRow;

/// コース（脆弱性カテゴリ単位の教材）
///
/// tasks_count は保存せず、読み取り時に COUNT で算出する
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub vulnerability_type: String,
    pub description: String,
    pub tasks_count: i64,
    /// 一覧取得時は空
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub difficulty: String,
    #[sqlx(rename = "task_order")]
    pub order: i64,
}
