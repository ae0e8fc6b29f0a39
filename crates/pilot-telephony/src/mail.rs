//! Outbound email over SMTP.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use pilot_core::config::EmailConfig;

use crate::error::TelephonyError;

/// A plain-text message ready to send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Something that can deliver an [`OutboundEmail`].
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TelephonyError>;
}

/// SMTP delivery through lettre's tokio transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer from config. Returns `None` when credentials are missing.
    pub fn from_config(config: &EmailConfig) -> Result<Option<Self>, TelephonyError> {
        let (Some(username), Some(password)) = (&config.username, &config.password) else {
            return Ok(None);
        };
        let from = parse_mailbox(config.sender().unwrap_or(username))?;

        let builder = if config.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| TelephonyError::Mail(e.to_string()))?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(username.clone(), password.clone()))
            .build();
        Ok(Some(Self { transport, from }))
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TelephonyError> {
        let message = build_message(&self.from, email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| TelephonyError::Mail(e.to_string()))?;
        info!(to = %email.to, "Email sent");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TelephonyError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| TelephonyError::Mail(format!("invalid address '{}': {}", address, e)))
}

fn build_message(from: &Mailbox, email: &OutboundEmail) -> Result<Message, TelephonyError> {
    Message::builder()
        .from(from.clone())
        .to(parse_mailbox(&email.to)?)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| TelephonyError::Mail(e.to_string()))
}
