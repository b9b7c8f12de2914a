//! Outbound email. The contact form reaches a mail provider only through the
//! `Mailer` trait.
//!
//! `AppState` carries an `Option<Arc<dyn Mailer>>`; `None` means no provider is
//! configured and submissions are answered with `CONTACT_SERVICE_UNAVAILABLE`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, MailProvider};
use crate::contact::ContactMessage;

pub mod resend;
pub mod smtp;

pub const SUBJECT_PREFIX: &str = "[Portfolio]";

#[derive(Debug, Error)]
pub enum MailError {
    /// Settings are present but unusable (bad address, unknown host, ...).
    #[error("Mail configuration error: {0}")]
    Misconfigured(String),

    /// The provider refused our credentials or sender identity.
    #[error("Mail provider rejected credentials: {0}")]
    Unauthorized(String),

    /// The submitter's address was rejected while building the message.
    #[error("Invalid reply-to address: {0}")]
    InvalidReplyTo(String),

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Mail provider timed out")]
    Timeout,
}

impl MailError {
    /// True when retrying cannot help until the site owner fixes configuration.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, MailError::Misconfigured(_) | MailError::Unauthorized(_))
    }
}

/// A provider-agnostic plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub reply_to: String,
    pub subject: String,
    pub text: String,
}

impl OutgoingEmail {
    pub fn from_contact(message: &ContactMessage, to: &str, received_at: DateTime<Utc>) -> Self {
        Self {
            to: to.to_string(),
            reply_to: message.email.clone(),
            subject: format!("{SUBJECT_PREFIX} {}", single_line(&message.subject)),
            text: format!(
                "Name: {}\nEmail: {}\nSubject: {}\nReceived: {}\n\n{}\n",
                message.name,
                message.email,
                message.subject,
                received_at.to_rfc3339(),
                message.message
            ),
        }
    }
}

/// Header values must not carry line breaks.
fn single_line(s: &str) -> String {
    s.split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Implement this to add a provider without touching the contact handler.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Short provider name reported back to the client (`smtp`, `resend`).
    fn provider(&self) -> &'static str;

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Picks the mail backend from configuration.
///
/// An explicit `MAIL_PROVIDER` wins; otherwise SMTP is preferred when fully
/// configured, then Resend. Returns `None` when nothing usable is set.
pub fn build_mailer(config: &Config) -> Result<Option<Arc<dyn Mailer>>, MailError> {
    let provider = match config.mail_provider {
        Some(provider) => Some(provider),
        None if config.smtp.is_some() => Some(MailProvider::Smtp),
        None if config.resend.is_some() => Some(MailProvider::Resend),
        None => None,
    };

    let mailer: Option<Arc<dyn Mailer>> = match provider {
        Some(MailProvider::Smtp) => match &config.smtp {
            Some(smtp) => Some(Arc::new(smtp::SmtpMailer::new(smtp, config.mail_timeout)?) as Arc<dyn Mailer>),
            None => {
                warn!("MAIL_PROVIDER=smtp but SMTP_HOST/SMTP_USER/SMTP_PASS are incomplete");
                None
            }
        },
        Some(MailProvider::Resend) => match &config.resend {
            Some(resend) => Some(Arc::new(resend::ResendMailer::new(resend, config.mail_timeout)?) as Arc<dyn Mailer>),
            None => {
                warn!("MAIL_PROVIDER=resend but RESEND_API_KEY/RESEND_FROM are incomplete");
                None
            }
        },
        None => None,
    };

    match &mailer {
        Some(m) => info!("Mail provider configured: {}", m.provider()),
        None => warn!("No mail provider configured; contact submissions will return 503"),
    }

    Ok(mailer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContactMessage {
        ContactMessage {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            subject: "Hello\r\nBcc: victim@example.com".into(),
            message: "Line one\nLine two".into(),
        }
    }

    #[test]
    fn test_outgoing_email_layout() {
        let received = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let email = OutgoingEmail::from_contact(&sample(), "owner@example.com", received);

        assert_eq!(email.to, "owner@example.com");
        assert_eq!(email.reply_to, "ana@example.com");
        assert_eq!(email.subject, "[Portfolio] Hello Bcc: victim@example.com");
        assert!(email.text.starts_with("Name: Ana\nEmail: ana@example.com\n"));
        assert!(email.text.contains("Received: 2026-01-02T03:04:05+00:00"));
        assert!(email.text.ends_with("Line one\nLine two\n"));
    }

    #[test]
    fn test_unavailable_classification() {
        assert!(MailError::Misconfigured("bad from".into()).is_unavailable());
        assert!(MailError::Unauthorized("535".into()).is_unavailable());
        assert!(!MailError::Transport("connection reset".into()).is_unavailable());
        assert!(!MailError::Timeout.is_unavailable());
        assert!(!MailError::InvalidReplyTo("x".into()).is_unavailable());
    }

    #[test]
    fn test_no_provider_without_settings() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert!(build_mailer(&config).unwrap().is_none());
    }

    #[test]
    fn test_resend_selected_when_only_resend_is_configured() {
        let config = Config::from_lookup(|key| match key {
            "RESEND_API_KEY" => Some("re_test".into()),
            "RESEND_FROM" => Some("Portfolio <hi@example.com>".into()),
            _ => None,
        })
        .unwrap();
        let mailer = build_mailer(&config).unwrap().unwrap();
        assert_eq!(mailer.provider(), "resend");
    }

    #[test]
    fn test_forced_provider_without_settings_yields_none() {
        let config = Config::from_lookup(|key| match key {
            "MAIL_PROVIDER" => Some("smtp".into()),
            "RESEND_API_KEY" => Some("re_test".into()),
            "RESEND_FROM" => Some("hi@example.com".into()),
            _ => None,
        })
        .unwrap();
        assert!(build_mailer(&config).unwrap().is_none());
    }
}
