//! Outbound email.
//!
//! [`Mailer`] is the seam: production uses [`SmtpMailer`] (lettre over a
//! STARTTLS relay), development without SMTP settings uses [`LogMailer`],
//! and tests plug in their own recorder.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment as LettreAttachment, MultiPart, SinglePart},
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::SmtpConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Invalid attachment content type: {0}")]
    InvalidContentType(String),
}

/// A file attached to an email.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A plain-text email with at most one attachment.
#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), EmailError>;
}

// =============================================================================
// SMTP
// =============================================================================

/// Email delivery over SMTP.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a new SMTP mailer from configuration.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(SmtpMailer {
            transport,
            from_address: config.from_address.clone(),
        })
    }

    fn build_message(&self, email: &Email) -> Result<Message, EmailError> {
        let builder = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(email.to.clone()))?)
            .subject(email.subject.clone());

        let message = match &email.attachment {
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(email.body.clone())?,
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .map_err(|_| EmailError::InvalidContentType(attachment.content_type.clone()))?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(email.body.clone()))
                        .singlepart(
                            LettreAttachment::new(attachment.filename.clone())
                                .body(attachment.bytes.clone(), content_type),
                        ),
                )?
            }
        };

        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<(), EmailError> {
        let message = self.build_message(&email)?;
        self.transport.send(message).await?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

// =============================================================================
// Log only
// =============================================================================

/// Logs instead of sending. Used when no SMTP relay is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), EmailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            attachment = email.attachment.as_ref().map(|a| a.filename.as_str()),
            "SMTP not configured; email logged instead of sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn mailer() -> SmtpMailer {
        SmtpMailer::new(&SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "user".to_string(),
            password: SecretString::from("pw".to_string()),
            from_address: "Shop <shop@example.com>".to_string(),
        })
        .unwrap()
    }

    fn email(to: &str) -> Email {
        Email {
            to: to.to_string(),
            subject: "Your invoice".to_string(),
            body: "Thanks for your order".to_string(),
            attachment: Some(Attachment {
                filename: "invoice.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                bytes: b"%PDF-1.3".to_vec(),
            }),
        }
    }

    #[tokio::test]
    async fn test_build_message_with_attachment() {
        let message = mailer().build_message(&email("ana@example.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Your invoice"));
        assert!(raw.contains("invoice.pdf"));
    }

    #[tokio::test]
    async fn test_invalid_recipient() {
        let err = mailer().build_message(&email("not an address")).unwrap_err();
        assert!(matches!(err, EmailError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        assert!(LogMailer.send(email("ana@example.com")).await.is_ok());
    }
}
