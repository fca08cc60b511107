//! Receipt mail delivery over SMTP via lettre.
//!
//! Delivery is fire-and-forget from the caller's perspective: a receipt
//! that cannot be delivered after retries is logged and dropped, never
//! surfaced to the upload response. Timeout-class SMTP failures are
//! retried; everything else fails on the first attempt.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use paperslip_core::Email;

use crate::config::EmailConfig;
use crate::retry::{RetryPolicy, Transient, execute_with_retry};

/// Display name on outgoing receipt mail.
pub const SENDER_NAME: &str = "領収書発行サービス";

/// Subject line of the receipt mail.
pub const RECEIPT_SUBJECT: &str = "【ご購入ありがとうございます】領収書のお送付について";

/// Plain-text body accompanying the PDF attachment.
pub const RECEIPT_TEXT: &str = "\
ご購入いただき、誠にありがとうございます。

この度のご購入の領収書をPDFファイルにて添付させていただきました。
ご確認のほど、よろしくお願いいたします。

ご不明な点がございましたら、お気軽にお問い合わせください。

※このメールへの返信は受け付けておりません。
";

/// Attachment file name presented to the recipient.
pub const RECEIPT_FILE_NAME: &str = "receipt.pdf";

/// Delivery retry: three calls total, three seconds between them.
const SEND_RETRY: RetryPolicy = RetryPolicy {
    max_calls: 3,
    delay: Duration::from_secs(3),
};

impl Transient for SmtpError {
    fn is_timeout(&self) -> bool {
        // Inherent `SmtpError::is_timeout`, not this trait method.
        SmtpError::is_timeout(self)
    }
}

/// Errors that can occur when preparing or sending receipt mail.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build the email message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// A sender or recipient address the transport cannot represent.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// The attachment content type could not be parsed.
    #[error("invalid content type: {0}")]
    ContentType(#[from] lettre::message::header::ContentTypeErr),
}

/// Delivers a rendered receipt PDF to one recipient.
///
/// Returns nothing: delivery failures are the implementation's to log,
/// not the dispatcher's to handle.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the receipt mail with `pdf` attached.
    async fn send_receipt(&self, to: &Email, pdf: Vec<u8>);
}

/// [`Mailer`] over an async SMTP transport.
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Create a mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay cannot be configured or the sender
    /// address is malformed.
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(MailError::Smtp)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        let from = format!("{SENDER_NAME} <{}>", config.from_address)
            .parse::<Mailbox>()
            .map_err(|_| MailError::InvalidAddress(config.from_address.clone()))?;

        Ok(Self { mailer, from })
    }

    /// Build the receipt message: plain-text body plus the PDF attachment.
    fn build_message(&self, to: &Email, pdf: Vec<u8>) -> Result<Message, MailError> {
        let to = to
            .as_str()
            .parse::<Mailbox>()
            .map_err(|_| MailError::InvalidAddress(to.as_str().to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(RECEIPT_SUBJECT)
            .multipart(
                MultiPart::mixed()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(RECEIPT_TEXT.to_string()),
                    )
                    .singlepart(
                        Attachment::new(RECEIPT_FILE_NAME.to_string())
                            .body(pdf, ContentType::parse("application/pdf")?),
                    ),
            )?;

        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_receipt(&self, to: &Email, pdf: Vec<u8>) {
        let message = match self.build_message(to, pdf) {
            Ok(message) => message,
            Err(error) => {
                tracing::error!(to = %to, %error, "failed to build receipt mail");
                return;
            }
        };

        let result = execute_with_retry(SEND_RETRY, || {
            let message = message.clone();
            async move { self.mailer.send(message).await }
        })
        .await;

        match result {
            Ok(_) => tracing::info!(to = %to, "receipt mail sent"),
            Err(error) => {
                // Absorbed: a lost mail must not fail the rest of the batch.
                tracing::error!(to = %to, %error, "receipt mail delivery failed, giving up");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: "user".to_string(),
            smtp_password: SecretString::from("password"),
            from_address: "noreply@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_message_carries_attachment() {
        let mailer = SmtpMailer::new(&config()).unwrap();
        let to = Email::parse("hong@example.com").unwrap();

        let message = mailer.build_message(&to, b"%PDF-1.4 test".to_vec()).unwrap();
        let formatted = String::from_utf8_lossy(&message.formatted()).to_string();

        assert!(formatted.contains(RECEIPT_FILE_NAME));
        assert!(formatted.contains("application/pdf"));
        assert!(formatted.contains("hong@example.com"));
    }

    #[tokio::test]
    async fn test_bad_sender_address_is_rejected() {
        let mut config = config();
        config.from_address = "not an address".to_string();
        assert!(matches!(
            SmtpMailer::new(&config),
            Err(MailError::InvalidAddress(_))
        ));
    }
}
