use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use futures::future::BoxFuture;
use secrecy::ExposeSecret;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};

use crate::config::Config;
use crate::error::AppError;

/// データベース接続設定
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub operation_timeout: Duration,
}

impl DatabaseSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.database_url.expose_secret().clone(),
            max_connections: config.database_max_connections,
            operation_timeout: Duration::from_secs(config.database_operation_timeout_secs),
        }
    }
}

/// 永続化ゲートウェイ
///
/// プロセス全体で共有する唯一のリソース。明示的に生成して各サービスへ注入する。
/// Clone はプールのハンドルを複製するだけ。
///
/// # Transactions
/// `transaction` に渡したクロージャが `Ok` を返した場合のみコミットする。
/// `Err`・タイムアウト・Future の drop（キャンセル）のいずれでもロールバックされ、
/// 途中まで実行した文が残ることはない。
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    operation_timeout: Duration,
}

impl Database {
    /// 接続プールを開く
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(&settings.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            // インメモリDBは最後の接続が閉じると消えるため、接続を破棄しない
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            operation_timeout: settings.operation_timeout,
        })
    }

    /// 組み込みマイグレーションを適用
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "マイグレーション失敗");
                AppError::Internal(anyhow::Error::new(e))
            })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 接続プールを閉じる（実行中の処理の完了を待つ）
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// 複数の文を1つのトランザクションとして実行
    ///
    /// 各ステップは結果を `?` で返すこと。エラーを変数に溜めて後続を続ける書き方はしない。
    pub async fn transaction<T, F>(&self, operation: &'static str, steps: F) -> Result<T, AppError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, AppError>>
            + Send,
    {
        // 接続の取得からコミット前までを1つの期限で区切る
        let deadline = tokio::time::Instant::now() + self.operation_timeout;

        let mut tx = match tokio::time::timeout_at(deadline, self.pool.begin()).await {
            Ok(tx) => tx?,
            Err(_) => {
                tracing::warn!(operation = %operation, "接続の取得がタイムアウト");
                return Err(AppError::DeadlineExceeded(operation));
            }
        };

        let outcome = tokio::time::timeout_at(deadline, steps(&mut *tx)).await;

        match outcome {
            Ok(Ok(value)) => {
                tx.commit().await?;
                Ok(value)
            }
            Ok(Err(e)) => {
                tracing::debug!(operation = %operation, error = %e, "トランザクションをロールバック");
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(operation = %operation, error = ?rollback_err, "ロールバック失敗");
                }
                Err(e)
            }
            Err(_) => {
                tracing::warn!(operation = %operation, "トランザクションがタイムアウト、ロールバック");
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(operation = %operation, error = ?rollback_err, "ロールバック失敗");
                }
                Err(AppError::DeadlineExceeded(operation))
            }
        }
    }

    /// 単発の問い合わせに操作タイムアウトを適用
    pub async fn with_deadline<T, E, Fut>(
        &self,
        operation: &'static str,
        fut: Fut,
    ) -> Result<T, AppError>
    where
        Fut: Future<Output = Result<T, E>>,
        AppError: From<E>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => {
                tracing::warn!(operation = %operation, "問い合わせがタイムアウト");
                Err(AppError::DeadlineExceeded(operation))
            }
        }
    }
}

/// 一意制約違反かどうか
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
