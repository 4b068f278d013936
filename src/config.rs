use secrecy::SecretBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // SMTP設定（オプション - email機能有効時のみ使用）
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretBox<String>>,
    #[serde(default)]
    pub smtp_from_address: Option<String>,

    // データベース設定
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    /// 1操作あたりの上限時間（超過時はロールバック）
    #[serde(default = "default_database_operation_timeout_secs")]
    pub database_operation_timeout_secs: u64,

    // OTP 設定
    #[serde(default = "default_otp_ttl_secs")]
    pub otp_ttl_secs: i64,

    // パスワードハッシュ（argon2id）のコスト設定
    #[serde(default = "default_password_hash_memory_kib")]
    pub password_hash_memory_kib: u32,
    #[serde(default = "default_password_hash_iterations")]
    pub password_hash_iterations: u32,
    #[serde(default = "default_password_hash_parallelism")]
    pub password_hash_parallelism: u32,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_DATABASE_OPERATION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_OTP_TTL_SECS: i64 = 300;
// argon2 クレートの既定値と同じ（OWASP 推奨値）
const DEFAULT_PASSWORD_HASH_MEMORY_KIB: u32 = 19 * 1024;
const DEFAULT_PASSWORD_HASH_ITERATIONS: u32 = 2;
const DEFAULT_PASSWORD_HASH_PARALLELISM: u32 = 1;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_database_max_connections() -> u32 {
    DEFAULT_DATABASE_MAX_CONNECTIONS
}

fn default_database_operation_timeout_secs() -> u64 {
    DEFAULT_DATABASE_OPERATION_TIMEOUT_SECS
}

fn default_otp_ttl_secs() -> i64 {
    DEFAULT_OTP_TTL_SECS
}

fn default_password_hash_memory_kib() -> u32 {
    DEFAULT_PASSWORD_HASH_MEMORY_KIB
}

fn default_password_hash_iterations() -> u32 {
    DEFAULT_PASSWORD_HASH_ITERATIONS
}

fn default_password_hash_parallelism() -> u32 {
    DEFAULT_PASSWORD_HASH_PARALLELISM
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}
