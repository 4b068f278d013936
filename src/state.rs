use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use crate::services::{
    AccessService, AuthService, CatalogService, EmailService, OtpService, PasswordService,
};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// リクエストをまたぐ可変状態は持たない（すべてDBに置く）。
#[derive(Clone)]
pub struct AppState {
    /// 永続化ゲートウェイ
    pub db: Database,
    /// 認証サービス
    pub auth_service: AuthService,
    /// OTPサービス
    pub otp_service: OtpService,
    /// アクセス制御サービス
    pub access_service: AccessService,
    /// コース・進捗サービス
    pub catalog_service: CatalogService,
    /// メールサービス
    pub email_service: EmailService,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(db: Database, config: &Config) -> Result<Self, AppError> {
        let passwords = PasswordService::new(
            config.password_hash_memory_kib,
            config.password_hash_iterations,
            config.password_hash_parallelism,
        )?;

        let email_service = EmailService::new(config)?;

        Ok(Self::with_services(
            db,
            passwords,
            config.otp_ttl_secs,
            email_service,
        ))
    }

    pub(crate) fn with_services(
        db: Database,
        passwords: PasswordService,
        otp_ttl_secs: i64,
        email_service: EmailService,
    ) -> Self {
        Self {
            auth_service: AuthService::new(db.clone(), passwords),
            otp_service: OtpService::new(db.clone(), otp_ttl_secs),
            access_service: AccessService::new(db.clone()),
            catalog_service: CatalogService::new(db.clone()),
            email_service,
            db,
        }
    }
}
