use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

use crate::error::AppError;

/// パスワードのハッシュ化と検証（argon2id）
///
/// # Security
/// - ハッシュはPHC形式でソルトとコストパラメータを含む
/// - 検証時はハッシュに埋め込まれたパラメータで再計算し、定数時間で比較する
/// - 平文パスワードはログに出力しない
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
    /// ユーザー不在時にも同じコストの検証を行うためのダミーハッシュ
    dummy_hash: String,
}

impl PasswordService {
    /// 新しい PasswordService を作成
    ///
    /// # Arguments
    /// * `memory_kib` - メモリコスト（KiB）
    /// * `iterations` - 反復回数
    /// * `parallelism` - 並列度
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, AppError> {
        let params = Params::new(memory_kib, iterations, parallelism, None).map_err(|e| {
            tracing::error!(error = %e, "argon2パラメータが不正");
            AppError::Internal(anyhow::anyhow!("invalid argon2 params: {e}"))
        })?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, "labgate-timing-equalizer")?;

        Ok(Self { argon2, dummy_hash })
    }

    /// パスワードをハッシュ化（呼び出しごとに新しいソルト）
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        hash_with(&self.argon2, password)
    }

    /// 保存済みハッシュとパスワードを照合
    ///
    /// パース不能なハッシュは不一致として扱う
    pub fn verify(&self, stored_hash: &str, password: &str) -> bool {
        let parsed_hash = match PasswordHash::new(stored_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(error = ?e, "パスワードハッシュのパースエラー");
                return false;
            }
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// タイミング攻撃対策: 結果を使わない検証を実行
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(&self.dummy_hash, password);
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = ?e, "パスワードハッシュ生成エラー");
            AppError::Internal(anyhow::anyhow!("password hash error"))
        })?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_passwords;

    #[test]
    fn test_hash_then_verify() {
        let passwords = test_passwords();
        let hash = passwords.hash("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(passwords.verify(&hash, "correct horse"));
        assert!(!passwords.verify(&hash, "correct horsf"));
        assert!(!passwords.verify(&hash, ""));
    }

    #[test]
    fn test_same_password_hashes_differently() {
        let passwords = test_passwords();
        let first = passwords.hash("password123").unwrap();
        let second = passwords.hash("password123").unwrap();

        assert_ne!(first, second);
        assert!(passwords.verify(&first, "password123"));
        assert!(passwords.verify(&second, "password123"));
    }

    #[test]
    fn test_hash_verifies_with_other_cost_settings() {
        // コストはハッシュに埋め込まれているため、設定変更後も既存ハッシュを検証できる
        let old = PasswordService::new(16, 2, 1).unwrap();
        let hash = old.hash("password123").unwrap();

        assert!(test_passwords().verify(&hash, "password123"));
    }

    #[test]
    fn test_invalid_hash_format_is_rejected() {
        let passwords = test_passwords();
        assert!(!passwords.verify("invalid_hash_format", "password123"));
    }

    #[test]
    fn test_invalid_params() {
        assert!(PasswordService::new(0, 0, 0).is_err());
    }
}
