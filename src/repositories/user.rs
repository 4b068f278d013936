use sqlx::{SqliteConnection, SqlitePool};
use time::OffsetDateTime;

use crate::models::User;

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// ユーザーIDでユーザーを検索
    pub async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email, full_name, totp_secret,
                   is_2fa_enabled, is_admin, is_active, last_login, otp_code, otp_expires_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// ユーザー名でユーザーを検索
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email, full_name, totp_secret,
                   is_2fa_enabled, is_admin, is_active, last_login, otp_code, otp_expires_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    /// ユーザー名またはメールアドレスが使用済みか
    pub async fn exists_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE username = $1 OR email = $2
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// 新しいユーザーを作成（有効・一般ユーザー・2FA無効）
    ///
    /// # Errors
    /// - UNIQUE制約違反時: `sqlx::Error::Database`
    ///   呼び出し側で `AppError::Conflict` に変換すること
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        full_name: &str,
        totp_secret: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, email, full_name, totp_secret,
                               is_2fa_enabled, is_admin, is_active)
            VALUES ($1, $2, $3, $4, $5, 0, 0, 1)
            RETURNING id, username, password_hash, email, full_name, totp_secret,
                      is_2fa_enabled, is_admin, is_active, last_login, otp_code, otp_expires_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(email)
        .bind(full_name)
        .bind(totp_secret)
        .fetch_one(&self.pool)
        .await
    }

    /// 全ユーザー（ID順）
    pub async fn list_all(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email, full_name, totp_secret,
                   is_2fa_enabled, is_admin, is_active, last_login, otp_code, otp_expires_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// 管理者フラグで絞り込み
    pub async fn list_by_role(&self, is_admin: bool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email, full_name, totp_secret,
                   is_2fa_enabled, is_admin, is_active, last_login, otp_code, otp_expires_at
            FROM users
            WHERE is_admin = $1
            ORDER BY id
            "#,
        )
        .bind(is_admin)
        .fetch_all(&self.pool)
        .await
    }

    /// ユーザー名・メールアドレス・氏名の部分一致検索
    ///
    /// # Note
    /// `%` と `_` はエスケープ済みのパターンを渡すこと（大文字小文字の扱いはDB依存）
    /// `is_admin` を指定するとそのロールに絞り込む
    pub async fn search(
        &self,
        like_pattern: &str,
        is_admin: Option<bool>,
    ) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email, full_name, totp_secret,
                   is_2fa_enabled, is_admin, is_active, last_login, otp_code, otp_expires_at
            FROM users
            WHERE (username LIKE $1 ESCAPE '\'
                   OR email LIKE $1 ESCAPE '\'
                   OR full_name LIKE $1 ESCAPE '\')
              AND ($2 IS NULL OR is_admin = $2)
            ORDER BY id
            "#,
        )
        .bind(like_pattern)
        .bind(is_admin)
        .fetch_all(&self.pool)
        .await
    }

    /// 管理者フラグを取得（ユーザー不在時は None）
    pub async fn find_is_admin(&self, user_id: i64) -> Result<Option<bool>, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT is_admin FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// 管理者フラグを設定
    ///
    /// # Returns
    /// 更新された行数（0 ならユーザー不在）
    pub async fn set_admin(&self, user_id: i64, is_admin: bool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET is_admin = $2 WHERE id = $1")
            .bind(user_id)
            .bind(is_admin)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// 有効フラグを設定
    pub async fn set_active(&self, user_id: i64, is_active: bool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
            .bind(user_id)
            .bind(is_active)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// 2FAを有効化
    pub async fn enable_2fa(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET is_2fa_enabled = 1 WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// 最終ログイン日時を更新
    pub async fn update_last_login(
        &self,
        user_id: i64,
        at: OffsetDateTime,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // === OTP ===

    /// OTPコードと有効期限を保存（既存のコードは上書き）
    ///
    /// # Note
    /// コードはログに出力しないこと
    pub async fn save_otp(
        &self,
        user_id: i64,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET otp_code = $2, otp_expires_at = $3
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(code)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// OTP列を取得（ユーザー不在時は None）
    pub async fn find_otp(
        &self,
        user_id: i64,
    ) -> Result<Option<(Option<String>, Option<OffsetDateTime>)>, sqlx::Error> {
        sqlx::query_as::<_, (Option<String>, Option<OffsetDateTime>)>(
            "SELECT otp_code, otp_expires_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// OTPを削除（冪等）
    pub async fn clear_otp(&self, user_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET otp_code = NULL, otp_expires_at = NULL WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // === トランザクション内で使用 ===

    /// ユーザーIDでユーザーを検索（トランザクション内）
    pub async fn find_by_id_in(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email, full_name, totp_secret,
                   is_2fa_enabled, is_admin, is_active, last_login, otp_code, otp_expires_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
    }

    pub async fn update_email(
        conn: &mut SqliteConnection,
        user_id: i64,
        email: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET email = $2 WHERE id = $1")
            .bind(user_id)
            .bind(email)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn update_full_name(
        conn: &mut SqliteConnection,
        user_id: i64,
        full_name: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET full_name = $2 WHERE id = $1")
            .bind(user_id)
            .bind(full_name)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// パスワードハッシュを更新
    ///
    /// # Note
    /// password_hash はログに出力しないこと
    pub async fn update_password(
        conn: &mut SqliteConnection,
        user_id: i64,
        new_password_hash: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(new_password_hash)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}
