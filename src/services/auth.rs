use data_encoding::BASE32;
use garde::Validate;
use rand::RngCore;
use time::OffsetDateTime;

use crate::db::{Database, is_unique_violation};
use crate::error::AppError;
use crate::models::{NewUser, ProfileUpdate, User};
use crate::repositories::UserRepository;
use crate::services::PasswordService;

const DUPLICATE_ACCOUNT: &str = "このユーザー名またはメールアドレスは既に使用されています";
const DUPLICATE_EMAIL: &str = "このメールアドレスは既に使用されています";

/// 認証サービス（資格情報ストア）
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    user_repo: UserRepository,
    passwords: PasswordService,
}

impl AuthService {
    /// 新しい AuthService を作成
    pub fn new(db: Database, passwords: PasswordService) -> Self {
        let user_repo = UserRepository::new(db.pool().clone());
        Self {
            db,
            user_repo,
            passwords,
        }
    }

    /// ユーザー登録
    ///
    /// # Security
    /// - パスワードはログに出力しない
    /// - パスワードは即座にハッシュ化
    pub async fn create_user(&self, candidate: NewUser) -> Result<User, AppError> {
        candidate.validate()?;

        let exists = self
            .db
            .with_deadline(
                "create_user",
                self.user_repo
                    .exists_by_username_or_email(&candidate.username, &candidate.email),
            )
            .await?;
        if exists {
            tracing::info!(username = %candidate.username, "登録失敗: ユーザー名またはメールアドレスが重複");
            return Err(AppError::Conflict(DUPLICATE_ACCOUNT.to_string()));
        }

        let password_hash = self.passwords.hash(&candidate.password)?;
        let totp_secret = generate_totp_secret();

        let user = self
            .db
            .with_deadline(
                "create_user",
                async {
                    self.user_repo
                        .create_user(
                            &candidate.username,
                            &candidate.email,
                            &password_hash,
                            &candidate.full_name,
                            &totp_secret,
                        )
                        .await
                        .map_err(|e| {
                            // 存在確認と INSERT の間に割り込まれた場合
                            if is_unique_violation(&e) {
                                return AppError::Conflict(DUPLICATE_ACCOUNT.to_string());
                            }
                            AppError::Database(e)
                        })
                },
            )
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "ユーザー登録成功");

        Ok(user)
    }

    /// ユーザー認証を実行
    ///
    /// タイミング攻撃対策: ユーザーが存在しない場合もダミーのパスワード検証を実行
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AppError> {
        let user = self
            .db
            .with_deadline("authenticate", self.user_repo.find_by_username(username))
            .await?;

        let Some(user) = user else {
            self.passwords.verify_dummy(password);
            tracing::warn!(username = %username, "認証失敗: ユーザー不在");
            return Err(AppError::Unauthorized("invalid_credentials".to_string()));
        };

        if !self.passwords.verify(&user.password_hash, password) {
            tracing::warn!(user_id = %user.id, "認証失敗: パスワード不一致");
            return Err(AppError::Unauthorized("invalid_credentials".to_string()));
        }

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "認証失敗: 無効化されたアカウント");
            return Err(AppError::Forbidden("account_inactive".to_string()));
        }

        tracing::info!(user_id = %user.id, "認証成功");
        Ok(user)
    }

    /// 保存済みハッシュとパスワードを照合
    pub fn verify_password(&self, stored_hash: &str, password: &str) -> bool {
        self.passwords.verify(stored_hash, password)
    }

    /// ユーザーIDでユーザーを取得
    pub async fn find_user(&self, user_id: i64) -> Result<User, AppError> {
        self.db
            .with_deadline("find_user", self.user_repo.find_by_id(user_id))
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// ユーザー名でユーザーを取得
    pub async fn find_user_by_username(&self, username: &str) -> Result<User, AppError> {
        self.db
            .with_deadline(
                "find_user_by_username",
                self.user_repo.find_by_username(username),
            )
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// プロフィールを部分更新
    ///
    /// 指定されたフィールドだけを1トランザクションで更新する。
    /// いずれかの更新が失敗した場合は全フィールドがロールバックされる。
    /// 更新順は 氏名 → パスワード → メールアドレス。
    pub async fn update_profile(
        &self,
        user_id: i64,
        update: ProfileUpdate,
    ) -> Result<User, AppError> {
        let update = update.normalized();
        update.validate()?;

        if update.is_empty() {
            return self.find_user(user_id).await;
        }

        // ハッシュ計算はトランザクション外で行う
        let password_hash = match update.password.as_deref() {
            Some(password) => Some(self.passwords.hash(password)?),
            None => None,
        };
        let ProfileUpdate {
            email, full_name, ..
        } = update;

        let user = self
            .db
            .transaction("update_profile", move |conn| {
                Box::pin(async move {
                    if let Some(full_name) = full_name.as_deref() {
                        let affected =
                            UserRepository::update_full_name(conn, user_id, full_name).await?;
                        ensure_updated(affected)?;
                    }

                    if let Some(password_hash) = password_hash.as_deref() {
                        let affected =
                            UserRepository::update_password(conn, user_id, password_hash).await?;
                        ensure_updated(affected)?;
                    }

                    if let Some(email) = email.as_deref() {
                        let affected = UserRepository::update_email(conn, user_id, email)
                            .await
                            .map_err(|e| {
                                if is_unique_violation(&e) {
                                    return AppError::Conflict(DUPLICATE_EMAIL.to_string());
                                }
                                AppError::Database(e)
                            })?;
                        ensure_updated(affected)?;
                    }

                    UserRepository::find_by_id_in(conn, user_id)
                        .await?
                        .ok_or(AppError::UserNotFound)
                })
            })
            .await?;

        tracing::info!(user_id = %user_id, "プロフィール更新完了");

        Ok(user)
    }

    /// 最終ログイン日時を記録
    ///
    /// ログイン処理を止めないため、失敗してもログ出力のみ
    pub async fn record_login(&self, user_id: i64) {
        let result = self
            .db
            .with_deadline(
                "record_login",
                self.user_repo
                    .update_last_login(user_id, OffsetDateTime::now_utc()),
            )
            .await;

        match result {
            Ok(0) => tracing::warn!(user_id = %user_id, "最終ログイン日時の更新対象なし"),
            Ok(_) => {}
            Err(e) => tracing::warn!(user_id = %user_id, error = ?e, "最終ログイン日時の更新に失敗"),
        }
    }
}

/// 更新行数0はユーザー不在
fn ensure_updated(affected: u64) -> Result<(), AppError> {
    if affected == 0 {
        return Err(AppError::UserNotFound);
    }
    Ok(())
}

/// 20バイトのランダムシークレットを生成し、Base32でエンコード（将来のTOTP用）
fn generate_totp_secret() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE32.encode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{new_user, test_database, test_passwords};

    async fn service() -> AuthService {
        AuthService::new(test_database().await, test_passwords())
    }

    #[tokio::test]
    async fn test_create_user_stores_hash_not_plaintext() {
        let service = service().await;

        let user = service
            .create_user(new_user("alice", "a@x.com"))
            .await
            .unwrap();

        assert_ne!(user.password_hash, "password123");
        assert!(service.verify_password(&user.password_hash, "password123"));
        assert!(user.is_active);
        assert!(!user.is_admin);
        assert!(!user.is_2fa_enabled);
        assert_eq!(user.totp_secret.len(), 32);
        assert!(user.otp_challenge().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let service = service().await;

        service
            .create_user(new_user("alice", "a@x.com"))
            .await
            .unwrap();
        let err = service
            .create_user(new_user("alice", "b@x.com"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let service = service().await;

        service
            .create_user(new_user("alice", "a@x.com"))
            .await
            .unwrap();
        let err = service
            .create_user(new_user("bob", "a@x.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let service = service().await;
        let mut candidate = new_user("alice", "a@x.com");
        candidate.password = "short".to_string();

        let err = service.create_user(candidate).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let service = service().await;
        let user = service
            .create_user(new_user("alice", "a@x.com"))
            .await
            .unwrap();

        let authenticated = service.authenticate("alice", "password123").await.unwrap();
        assert_eq!(authenticated.id, user.id);

        let wrong = service.authenticate("alice", "password124").await.unwrap_err();
        let missing = service.authenticate("nobody", "password123").await.unwrap_err();
        assert_eq!(wrong.kind(), ErrorKind::Unauthorized);
        assert_eq!(missing.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_authenticate_inactive_user_is_forbidden() {
        let service = service().await;
        let user = service
            .create_user(new_user("alice", "a@x.com"))
            .await
            .unwrap();
        service.user_repo.set_active(user.id, false).await.unwrap();

        let err = service.authenticate("alice", "password123").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_update_profile_only_full_name() {
        let service = service().await;
        let user = service
            .create_user(new_user("alice", "a@x.com"))
            .await
            .unwrap();

        let updated = service
            .update_profile(
                user.id,
                ProfileUpdate {
                    email: Some(String::new()),
                    full_name: Some("new".to_string()),
                    password: Some(String::new()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.full_name, "new");
        assert_eq!(updated.email, "a@x.com");
        assert_eq!(updated.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn test_update_profile_rehashes_password() {
        let service = service().await;
        let user = service
            .create_user(new_user("alice", "a@x.com"))
            .await
            .unwrap();

        let updated = service
            .update_profile(
                user.id,
                ProfileUpdate {
                    password: Some("new-password".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_ne!(updated.password_hash, user.password_hash);
        assert!(service.verify_password(&updated.password_hash, "new-password"));
        assert!(!service.verify_password(&updated.password_hash, "password123"));
    }

    #[tokio::test]
    async fn test_update_profile_conflict_rolls_back_all_fields() {
        let service = service().await;
        let alice = service
            .create_user(new_user("alice", "a@x.com"))
            .await
            .unwrap();
        service
            .create_user(new_user("bob", "b@x.com"))
            .await
            .unwrap();

        let err = service
            .update_profile(
                alice.id,
                ProfileUpdate {
                    email: Some("b@x.com".to_string()),
                    full_name: Some("Changed".to_string()),
                    password: Some("new-password".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // 氏名・パスワードは書き込み済みの段階でメール更新が失敗する
        let reloaded = service.find_user(alice.id).await.unwrap();
        assert_eq!(reloaded.email, "a@x.com");
        assert_eq!(reloaded.full_name, alice.full_name);
        assert_eq!(reloaded.password_hash, alice.password_hash);
    }

    #[tokio::test]
    async fn test_update_profile_unknown_user() {
        let service = service().await;

        let err = service
            .update_profile(
                9999,
                ProfileUpdate {
                    full_name: Some("ghost".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UserNotFound));
    }

    #[tokio::test]
    async fn test_record_login_sets_last_login() {
        let service = service().await;
        let user = service
            .create_user(new_user("alice", "a@x.com"))
            .await
            .unwrap();
        assert!(user.last_login.is_none());

        service.record_login(user.id).await;
        // 存在しないユーザーでも失敗しない
        service.record_login(9999).await;

        let reloaded = service.find_user_by_username("alice").await.unwrap();
        assert!(reloaded.last_login.is_some());
    }

    #[test]
    fn test_generate_totp_secret() {
        let secret = generate_totp_secret();
        // Base32エンコードされた20バイト = 32文字
        assert_eq!(secret.len(), 32);
        assert!(
            secret
                .chars()
                .all(|c| "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567".contains(c))
        );
    }
}
