//! テスト用ヘルパー（テストごとに独立したインメモリDB）

use std::time::Duration;

use crate::db::{Database, DatabaseSettings};
use crate::models::NewUser;
use crate::services::{EmailService, PasswordService};
use crate::state::AppState;

/// マイグレーション適用済みのインメモリDBを作成
pub(crate) async fn test_database() -> Database {
    let settings = DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        operation_timeout: Duration::from_secs(5),
    };
    let db = Database::connect(&settings).await.unwrap();
    db.migrate().await.unwrap();
    db
}

/// 一時ファイル上のDB（複数接続で読み書きを並行させる用）
///
/// 返り値の `TempDir` を drop するとファイルも消えるため、テスト終了まで保持すること
pub(crate) async fn file_database(max_connections: u32) -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let settings = DatabaseSettings {
        url: format!("sqlite://{}", dir.path().join("labgate.db").display()),
        max_connections,
        operation_timeout: Duration::from_secs(10),
    };
    let db = Database::connect(&settings).await.unwrap();
    db.migrate().await.unwrap();
    (dir, db)
}

/// テスト用の低コストなパスワードハッシュ設定
pub(crate) fn test_passwords() -> PasswordService {
    PasswordService::new(8, 1, 1).unwrap()
}

/// インメモリDBに接続した AppState
pub(crate) async fn test_state() -> AppState {
    AppState::with_services(
        test_database().await,
        test_passwords(),
        300,
        EmailService::default(),
    )
}

pub(crate) fn new_user(username: &str, email: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
        full_name: format!("{username} tester"),
    }
}

/// コースとタスクを投入し、(コースID, タスクID一覧) を返す
///
/// タスクは引数の順に挿入される（task_order とは無関係）
pub(crate) async fn seed_course(
    db: &Database,
    vulnerability_type: &str,
    tasks: &[(&str, i64)],
) -> (i64, Vec<i64>) {
    let course_id: i64 = sqlx::query_scalar(
        "INSERT INTO courses (vulnerability_type, description) VALUES ($1, $2) RETURNING id",
    )
    .bind(vulnerability_type)
    .bind(format!("{vulnerability_type} basics"))
    .fetch_one(db.pool())
    .await
    .unwrap();

    let mut task_ids = Vec::with_capacity(tasks.len());
    for (title, order) in tasks {
        let task_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tasks (course_id, title, description, difficulty, task_order)
            VALUES ($1, $2, '', 'easy', $3)
            RETURNING id
            "#,
        )
        .bind(course_id)
        .bind(*title)
        .bind(*order)
        .fetch_one(db.pool())
        .await
        .unwrap();
        task_ids.push(task_id);
    }

    (course_id, task_ids)
}
