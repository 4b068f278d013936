use rand::Rng;
use subtle::{Choice, ConstantTimeEq};
use time::{Duration, OffsetDateTime};

use crate::db::Database;
use crate::error::AppError;
use crate::models::OtpChallenge;
use crate::repositories::UserRepository;

/// チャレンジ不在時の比較相手（有効期限がないため一致しても成功しない）
const DUMMY_OTP_CODE: &str = "000000";

/// OTP (One-Time Password) サービス
///
/// ユーザー行の otp_code / otp_expires_at に1件だけチャレンジを保持する。
///
/// # Security
/// - コードの比較は定数時間で行う
/// - チャレンジの有無にかかわらず必ず比較を実行し、分岐は最後に行う
/// - コードはログに出力しない
#[derive(Clone)]
pub struct OtpService {
    db: Database,
    user_repo: UserRepository,
    ttl: Duration,
}

impl OtpService {
    /// 新しい OtpService を作成
    ///
    /// # Arguments
    /// * `ttl_secs` - 発行から失効までの秒数
    pub fn new(db: Database, ttl_secs: i64) -> Self {
        let user_repo = UserRepository::new(db.pool().clone());
        Self {
            db,
            user_repo,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// 6桁のランダムコードを生成
    pub fn generate_code() -> String {
        let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
        format!("{code:06}")
    }

    /// コードを生成して保存し、配送用に返す
    pub async fn issue_code(&self, user_id: i64) -> Result<String, AppError> {
        let code = Self::generate_code();
        self.save_code(user_id, &code).await?;
        Ok(code)
    }

    /// コードを保存（既存のチャレンジは上書き）
    pub async fn save_code(&self, user_id: i64, code: &str) -> Result<(), AppError> {
        self.save_code_at(user_id, code, OffsetDateTime::now_utc())
            .await
    }

    pub(crate) async fn save_code_at(
        &self,
        user_id: i64,
        code: &str,
        issued_at: OffsetDateTime,
    ) -> Result<(), AppError> {
        let expires_at = issued_at + self.ttl;
        let affected = self
            .db
            .with_deadline(
                "save_otp_code",
                self.user_repo.save_otp(user_id, code, expires_at),
            )
            .await?;

        if affected == 0 {
            return Err(AppError::UserNotFound);
        }

        tracing::info!(user_id = %user_id, expires_at = %expires_at, "OTPコード発行");
        Ok(())
    }

    /// コードを検証
    ///
    /// チャレンジなし・空コード・期限切れ・不一致はすべて `false`。
    /// 検証に成功してもコードは削除しない（`clear_code` を呼ぶこと）。
    pub async fn verify_code(&self, user_id: i64, code: &str) -> Result<bool, AppError> {
        self.verify_code_at(user_id, code, OffsetDateTime::now_utc())
            .await
    }

    pub(crate) async fn verify_code_at(
        &self,
        user_id: i64,
        code: &str,
        now: OffsetDateTime,
    ) -> Result<bool, AppError> {
        let columns = self
            .db
            .with_deadline("verify_otp_code", self.user_repo.find_otp(user_id))
            .await?;
        let challenge =
            columns.and_then(|(code, expires_at)| OtpChallenge::from_columns(code, expires_at));

        let verified = challenge_matches(challenge.as_ref(), code, now);
        if !verified {
            tracing::warn!(user_id = %user_id, "OTP検証失敗");
        }

        Ok(verified)
    }

    /// チャレンジを削除（冪等）
    pub async fn clear_code(&self, user_id: i64) -> Result<(), AppError> {
        self.db
            .with_deadline("clear_otp_code", self.user_repo.clear_otp(user_id))
            .await
    }

    /// 2FAを有効化
    ///
    /// # Note
    /// チャレンジ検証済みであることは呼び出し側で保証する
    pub async fn enable_2fa(&self, user_id: i64) -> Result<(), AppError> {
        let affected = self
            .db
            .with_deadline("enable_2fa", self.user_repo.enable_2fa(user_id))
            .await?;

        if affected == 0 {
            return Err(AppError::UserNotFound);
        }

        tracing::info!(user_id = %user_id, "2FA有効化完了");
        Ok(())
    }
}

/// チャレンジと入力コードの照合
///
/// 比較は常に実行し、有効期限の判定と合わせてから bool に変換する
fn challenge_matches(
    challenge: Option<&OtpChallenge>,
    supplied: &str,
    now: OffsetDateTime,
) -> bool {
    let (stored, live) = match challenge {
        Some(c) => (c.code.as_str(), !c.code.is_empty() && now <= c.expires_at),
        None => (DUMMY_OTP_CODE, false),
    };

    let matches = stored.as_bytes().ct_eq(supplied.as_bytes());
    (matches & Choice::from(u8::from(live))).into()
}
