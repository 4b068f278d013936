use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// users テーブルの1行
///
/// otp_code / otp_expires_at は個別に扱わず `otp_challenge()` 経由で参照する
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub full_name: String,
    pub totp_secret: String,
    pub is_2fa_enabled: bool,
    pub is_admin: bool,
    pub is_active: bool,
    pub last_login: Option<OffsetDateTime>,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<OffsetDateTime>,
}

impl User {
    /// 保留中のOTPチャレンジ
    pub fn otp_challenge(&self) -> Option<OtpChallenge> {
        OtpChallenge::from_columns(self.otp_code.clone(), self.otp_expires_at)
    }
}

/// 発行済みのワンタイムコード
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub code: String,
    pub expires_at: OffsetDateTime,
}

impl OtpChallenge {
    /// 片方だけセットされた行はチャレンジなしとして扱う
    pub fn from_columns(code: Option<String>, expires_at: Option<OffsetDateTime>) -> Option<Self> {
        match (code, expires_at) {
            (Some(code), Some(expires_at)) => Some(Self { code, expires_at }),
            _ => None,
        }
    }
}

/// 登録候補
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[garde(length(min = 3, max = 50))]
    pub username: String,
    #[garde(length(min = 3, max = 254), contains("@"))]
    pub email: String,
    #[garde(length(min = 8, max = 128))]
    pub password: String, // SecretBox不要（Deserialize後すぐハッシュ化）
    #[serde(default)]
    #[garde(length(max = 100))]
    pub full_name: String,
}

/// プロフィールの部分更新
///
/// 空文字は「変更なし」として扱う
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    #[garde(length(min = 3, max = 254), contains("@"))]
    pub email: Option<String>,
    #[serde(default)]
    #[garde(length(max = 100))]
    pub full_name: Option<String>,
    #[serde(default)]
    #[garde(length(min = 8, max = 128))]
    pub password: Option<String>,
}

impl ProfileUpdate {
    /// 空文字のフィールドを None に正規化
    pub fn normalized(self) -> Self {
        fn present(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }

        Self {
            email: present(self.email),
            full_name: present(self.full_name),
            password: present(self.password),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.full_name.is_none() && self.password.is_none()
    }
}

/// クライアントへ返すユーザー情報
///
/// is_admin / is_active / last_login は管理者向けビューでのみ含める
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub is_2fa_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub last_login: Option<OffsetDateTime>,
}

impl UserProfile {
    /// 本人向けビュー
    pub fn self_view(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            is_2fa_enabled: user.is_2fa_enabled,
            is_admin: None,
            is_active: None,
            last_login: None,
        }
    }

    /// 管理者向けビュー
    pub fn admin_view(user: &User) -> Self {
        Self {
            is_admin: Some(user.is_admin),
            is_active: Some(user.is_active),
            last_login: user.last_login,
            ..Self::self_view(user)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            password_hash: "$argon2id$...".to_string(),
            email: "a@x.com".to_string(),
            full_name: "Alice".to_string(),
            totp_secret: String::new(),
            is_2fa_enabled: true,
            is_admin: false,
            is_active: true,
            last_login: None,
            otp_code: Some("123456".to_string()),
            otp_expires_at: None,
        }
    }

    #[test]
    fn test_half_set_challenge_is_absent() {
        let user = sample_user();
        assert_eq!(user.otp_challenge(), None);
    }

    #[test]
    fn test_normalized_drops_empty_fields() {
        let update = ProfileUpdate {
            email: Some(String::new()),
            full_name: Some("new".to_string()),
            password: Some(String::new()),
        }
        .normalized();

        assert_eq!(update.email, None);
        assert_eq!(update.full_name.as_deref(), Some("new"));
        assert_eq!(update.password, None);
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_profile_update_rejects_short_password() {
        let update = ProfileUpdate {
            password: Some("short".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_new_user_validation() {
        let mut candidate = NewUser {
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password: "password123".to_string(),
            full_name: String::new(),
        };
        assert!(candidate.validate().is_ok());

        candidate.email = "invalid-email".to_string();
        assert!(candidate.validate().is_err());
    }

    #[test]
    fn test_self_view_omits_admin_fields() {
        let json = serde_json::to_value(UserProfile::self_view(&sample_user())).unwrap();

        assert_eq!(json["fullName"], "Alice");
        assert_eq!(json["is2faEnabled"], true);
        assert!(json.get("isAdmin").is_none());
        assert!(json.get("isActive").is_none());
        assert!(json.get("passwordHash").is_none());
    }

    #[test]
    fn test_admin_view_includes_admin_fields() {
        let json = serde_json::to_value(UserProfile::admin_view(&sample_user())).unwrap();

        assert_eq!(json["isAdmin"], false);
        assert_eq!(json["isActive"], true);
    }
}
