use crate::config::Config;
use crate::error::AppError;
use crate::models::User;

/// メール送信サービス
///
/// `email` 機能が有効かつ SMTP 設定がある場合は lettre で送信する。
/// それ以外は開発モード（送信先のみログ出力）。
#[derive(Clone, Default)]
pub struct EmailService {
    #[cfg(feature = "email")]
    smtp: Option<smtp::SmtpSender>,
}

impl EmailService {
    /// 設定から EmailService を作成
    pub fn new(config: &Config) -> Result<Self, AppError> {
        #[cfg(feature = "email")]
        {
            let smtp = smtp::SmtpSender::from_config(config)?;
            if smtp.is_none() {
                tracing::warn!("SMTP未設定のため開発モードで起動（ワンタイムコードは配送されない）");
            }
            Ok(Self { smtp })
        }

        #[cfg(not(feature = "email"))]
        {
            if config.smtp_host.is_some() {
                tracing::warn!("SMTP設定がありますが email 機能が無効です");
            }
            Ok(Self::default())
        }
    }

    /// SMTP で実際に配送するかどうか
    pub fn delivers(&self) -> bool {
        #[cfg(feature = "email")]
        {
            self.smtp.is_some()
        }

        #[cfg(not(feature = "email"))]
        {
            false
        }
    }

    /// ワンタイムコードを送信
    ///
    /// # Security
    /// - コードはログに出力しない
    pub async fn send_otp_code(&self, user: &User, code: &str) -> Result<(), AppError> {
        #[cfg(feature = "email")]
        if let Some(smtp) = &self.smtp {
            smtp.send_otp_code(&user.email, code).await?;
            tracing::info!(user_id = %user.id, to = %user.email, "ワンタイムコード送信");
            return Ok(());
        }

        tracing::info!(
            user_id = %user.id,
            to = %user.email,
            code_len = code.len(),
            "ワンタイムコード送信（開発モード）"
        );
        Ok(())
    }
}

#[cfg(feature = "email")]
mod smtp {
    use std::sync::Arc;

    use lettre::message::{Mailbox, header::ContentType};
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
    use secrecy::ExposeSecret;

    use crate::config::Config;
    use crate::error::AppError;

    #[derive(Clone)]
    pub(super) struct SmtpSender {
        transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
        from: Mailbox,
    }

    impl SmtpSender {
        /// SMTP_HOST と SMTP_FROM_ADDRESS が揃っている場合のみ構築
        pub(super) fn from_config(config: &Config) -> Result<Option<Self>, AppError> {
            let (Some(host), Some(from)) = (
                config.smtp_host.as_deref(),
                config.smtp_from_address.as_deref(),
            ) else {
                return Ok(None);
            };

            let from: Mailbox = from.parse().map_err(anyhow::Error::new)?;
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(anyhow::Error::new)?
                .port(config.smtp_port);

            if let (Some(username), Some(password)) =
                (config.smtp_username.as_ref(), config.smtp_password.as_ref())
            {
                builder = builder.credentials(Credentials::new(
                    username.clone(),
                    password.expose_secret().clone(),
                ));
            }

            tracing::info!(host = %host, port = %config.smtp_port, "SMTP送信を有効化");

            Ok(Some(Self {
                transport: Arc::new(builder.build()),
                from,
            }))
        }

        pub(super) async fn send_otp_code(&self, to: &str, code: &str) -> Result<(), AppError> {
            let to: Mailbox = to.parse().map_err(anyhow::Error::new)?;

            let message = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject("認証コードのお知らせ")
                .header(ContentType::TEXT_PLAIN)
                .body(format!(
                    "認証コード: {code}\n\nこのコードに心当たりがない場合は破棄してください。\n"
                ))
                .map_err(anyhow::Error::new)?;

            self.transport.send(message).await.map_err(|e| {
                tracing::error!(error = ?e, "メール送信に失敗");
                AppError::Internal(anyhow::Error::new(e))
            })?;

            Ok(())
        }
    }
}
