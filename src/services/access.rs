use crate::db::Database;
use crate::error::AppError;
use crate::models::User;
use crate::repositories::UserRepository;

/// 操作に必要な権限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// 有効なアカウント
    Active,
    /// 有効な管理者アカウント
    Admin,
}

impl Requirement {
    pub fn is_satisfied_by(self, user: &User) -> bool {
        match self {
            Self::Active => user.is_active,
            Self::Admin => user.is_active && user.is_admin,
        }
    }
}

/// アクセス制御サービス（ロール・アカウント状態）
#[derive(Clone)]
pub struct AccessService {
    db: Database,
    user_repo: UserRepository,
}

impl AccessService {
    pub fn new(db: Database) -> Self {
        let user_repo = UserRepository::new(db.pool().clone());
        Self { db, user_repo }
    }

    /// 操作ごとに1回だけ評価する権限チェック
    ///
    /// # Returns
    /// 権限を満たした呼び出し元ユーザー
    pub async fn authorize(&self, user_id: i64, requirement: Requirement) -> Result<User, AppError> {
        let user = self
            .db
            .with_deadline("authorize", self.user_repo.find_by_id(user_id))
            .await?
            .ok_or_else(|| AppError::Unauthorized("unknown_principal".to_string()))?;

        if !requirement.is_satisfied_by(&user) {
            tracing::warn!(user_id = %user_id, requirement = ?requirement, "権限不足");
            let reason = if user.is_active {
                "admin_required"
            } else {
                "account_inactive"
            };
            return Err(AppError::Forbidden(reason.to_string()));
        }

        Ok(user)
    }

    /// 管理者かどうか
    pub async fn is_admin(&self, user_id: i64) -> Result<bool, AppError> {
        self.db
            .with_deadline("is_admin", self.user_repo.find_is_admin(user_id))
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// 管理者に昇格（既に管理者なら何もしない）
    pub async fn promote_to_admin(&self, user_id: i64) -> Result<(), AppError> {
        self.set_admin(user_id, true).await?;
        tracing::info!(user_id = %user_id, "管理者に昇格");
        Ok(())
    }

    /// 管理者から降格（既に一般ユーザーなら何もしない）
    pub async fn demote_from_admin(&self, user_id: i64) -> Result<(), AppError> {
        self.set_admin(user_id, false).await?;
        tracing::info!(user_id = %user_id, "管理者から降格");
        Ok(())
    }

    async fn set_admin(&self, user_id: i64, is_admin: bool) -> Result<(), AppError> {
        let affected = self
            .db
            .with_deadline("set_admin", self.user_repo.set_admin(user_id, is_admin))
            .await?;

        if affected == 0 {
            return Err(AppError::UserNotFound);
        }
        Ok(())
    }

    /// アカウントの有効・無効を切り替え
    ///
    /// # Note
    /// 無効ユーザーの操作拒否は `authorize` で行う
    pub async fn update_user_status(&self, user_id: i64, is_active: bool) -> Result<(), AppError> {
        let affected = self
            .db
            .with_deadline(
                "update_user_status",
                self.user_repo.set_active(user_id, is_active),
            )
            .await?;

        if affected == 0 {
            return Err(AppError::UserNotFound);
        }

        tracing::info!(user_id = %user_id, is_active = is_active, "アカウント状態を更新");
        Ok(())
    }

    pub async fn users_by_role(&self, is_admin: bool) -> Result<Vec<User>, AppError> {
        self.db
            .with_deadline("users_by_role", self.user_repo.list_by_role(is_admin))
            .await
    }

    /// ユーザー名・メールアドレス・氏名の部分一致検索
    pub async fn search_users(&self, query: &str) -> Result<Vec<User>, AppError> {
        self.search(query, None).await
    }

    /// 部分一致検索をロールで絞り込む
    pub async fn search_users_by_role(
        &self,
        query: &str,
        is_admin: bool,
    ) -> Result<Vec<User>, AppError> {
        self.search(query, Some(is_admin)).await
    }

    async fn search(&self, query: &str, is_admin: Option<bool>) -> Result<Vec<User>, AppError> {
        let pattern = format!("%{}%", escape_like(query));
        self.db
            .with_deadline("search_users", self.user_repo.search(&pattern, is_admin))
            .await
    }

    pub async fn all_users(&self) -> Result<Vec<User>, AppError> {
        self.db
            .with_deadline("all_users", self.user_repo.list_all())
            .await
    }
}

/// LIKE のワイルドカードをエスケープ
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::services::AuthService;
    use crate::testing::{new_user, test_database, test_passwords};

    async fn setup(usernames: &[&str]) -> (AccessService, Vec<i64>) {
        let db = test_database().await;
        let auth = AuthService::new(db.clone(), test_passwords());

        let mut ids = Vec::new();
        for name in usernames {
            let user = auth
                .create_user(new_user(name, &format!("{name}@example.com")))
                .await
                .unwrap();
            ids.push(user.id);
        }

        (AccessService::new(db), ids)
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a%b_c\\d"), "a\\%b\\_c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[tokio::test]
    async fn test_promote_then_demote() {
        let (access, ids) = setup(&["alice"]).await;
        let id = ids[0];

        assert!(!access.is_admin(id).await.unwrap());

        access.promote_to_admin(id).await.unwrap();
        access.promote_to_admin(id).await.unwrap();
        assert!(access.is_admin(id).await.unwrap());

        access.demote_from_admin(id).await.unwrap();
        assert!(!access.is_admin(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (access, _) = setup(&[]).await;

        assert!(matches!(access.is_admin(3).await, Err(AppError::UserNotFound)));
        assert!(matches!(
            access.promote_to_admin(3).await,
            Err(AppError::UserNotFound)
        ));
        assert!(matches!(
            access.update_user_status(3, false).await,
            Err(AppError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_authorize() {
        let (access, ids) = setup(&["alice", "bob"]).await;
        let (alice, bob) = (ids[0], ids[1]);
        access.promote_to_admin(alice).await.unwrap();

        assert!(access.authorize(alice, Requirement::Admin).await.is_ok());
        assert!(access.authorize(bob, Requirement::Active).await.is_ok());

        let err = access.authorize(bob, Requirement::Admin).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        // 無効化された管理者はどちらの権限も満たさない
        access.update_user_status(alice, false).await.unwrap();
        for requirement in [Requirement::Active, Requirement::Admin] {
            let err = access.authorize(alice, requirement).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Forbidden);
        }

        let err = access.authorize(9999, Requirement::Active).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_listings() {
        let (access, ids) = setup(&["alice", "bob", "carol"]).await;
        access.promote_to_admin(ids[1]).await.unwrap();

        let admins = access.users_by_role(true).await.unwrap();
        assert_eq!(
            admins.iter().map(|u| u.username.as_str()).collect::<Vec<_>>(),
            ["bob"]
        );

        let regular = access.users_by_role(false).await.unwrap();
        assert_eq!(regular.len(), 2);

        let all = access.all_users().await.unwrap();
        assert_eq!(all.iter().map(|u| u.id).collect::<Vec<_>>(), ids);
    }

    #[tokio::test]
    async fn test_search_users() {
        let (access, _) = setup(&["alice", "bob", "malice"]).await;

        let found = access.search_users("lic").await.unwrap();
        assert_eq!(
            found.iter().map(|u| u.username.as_str()).collect::<Vec<_>>(),
            ["alice", "malice"]
        );

        // 氏名（"bob tester"）とメールアドレスも対象
        assert_eq!(access.search_users("tester").await.unwrap().len(), 3);
        assert_eq!(access.search_users("bob@").await.unwrap().len(), 1);

        // ワイルドカードは文字として扱う
        assert!(access.search_users("%").await.unwrap().is_empty());
        assert!(access.search_users("zzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_users_by_role() {
        let (access, ids) = setup(&["alice", "bob", "malice"]).await;
        access.promote_to_admin(ids[2]).await.unwrap();

        let admins = access.search_users_by_role("lic", true).await.unwrap();
        assert_eq!(
            admins.iter().map(|u| u.username.as_str()).collect::<Vec<_>>(),
            ["malice"]
        );

        let regular = access.search_users_by_role("lic", false).await.unwrap();
        assert_eq!(
            regular.iter().map(|u| u.username.as_str()).collect::<Vec<_>>(),
            ["alice"]
        );

        assert!(access.search_users_by_role("bob", true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_listings_are_not_errors() {
        let (access, _) = setup(&[]).await;

        assert!(access.all_users().await.unwrap().is_empty());
        assert!(access.users_by_role(true).await.unwrap().is_empty());
    }
}
