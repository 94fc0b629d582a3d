//! Email alerts
//!
//! Notification is a side channel: sending can fail or be switched off and
//! the run carries on the same way. Nothing in here returns an error.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::MailSettings;
use crate::model::Notification;

#[async_trait]
pub trait Notify: Send + Sync {
    /// Send one message; `true` only if it was handed to the mail server
    async fn notify(&self, subject: &str, body: &str) -> bool;

    async fn notify_event(&self, event: &Notification) -> bool {
        self.notify(&event.subject, &event.body).await
    }
}

/// Drops every message
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notify for NoopNotifier {
    async fn notify(&self, _subject: &str, _body: &str) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("send task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Sends plain-text mail over SMTP with STARTTLS, from and to the configured
/// recipient
#[derive(Debug, Clone)]
pub struct MailNotifier {
    settings: MailSettings,
}

impl MailNotifier {
    pub fn new(settings: MailSettings) -> Self {
        Self { settings }
    }

    /// Whether a call to `notify` would try the network at all
    pub fn is_active(&self) -> bool {
        self.settings.ready().is_some()
    }

    async fn send(&self, recipient: &str, password: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let mailbox: Mailbox = recipient.parse()?;
        let message = Message::builder()
            .from(mailbox.clone())
            .to(mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        let mailer = SmtpTransport::starttls_relay(&self.settings.smtp_host)?
            .port(self.settings.smtp_port)
            .credentials(SmtpCredentials::new(recipient.to_string(), password.to_string()))
            .build();

        // lettre's SmtpTransport is blocking
        tokio::task::spawn_blocking(move || mailer.send(&message)).await??;
        Ok(())
    }
}

#[async_trait]
impl Notify for MailNotifier {
    async fn notify(&self, subject: &str, body: &str) -> bool {
        let Some((recipient, password)) = self.settings.ready() else {
            tracing::debug!(subject, "email notifications off, not sending");
            return false;
        };

        match self.send(recipient, password, subject, body).await {
            Ok(()) => {
                tracing::info!(subject, "Notification sent");
                true
            }
            Err(e) => {
                tracing::error!(subject, error = %e, "Failed to send notification");
                false
            }
        }
    }
}
