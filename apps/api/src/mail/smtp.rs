use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

use super::{MailError, Mailer, OutgoingEmail};
use crate::config::SmtpConfig;

/// SMTP relay transport. Port 465 uses implicit TLS, any other port STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, timeout: Duration) -> Result<Self, MailError> {
        let builder = if config.implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| MailError::Misconfigured(format!("SMTP host '{}': {e}", config.host)))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .timeout(Some(timeout))
            .build();

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| MailError::Misconfigured(format!("SMTP_FROM '{}': {e}", config.from)))?;

        Ok(Self { transport, from })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, MailError> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| MailError::Misconfigured(format!("CONTACT_TO_EMAIL '{}': {e}", email.to)))?;
        let reply_to = email
            .reply_to
            .parse::<Mailbox>()
            .map_err(|e| MailError::InvalidReplyTo(e.to_string()))?;

        Message::builder()
            .from(self.from.clone())
            .reply_to(reply_to)
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.text.clone())
            .map_err(|e| MailError::Misconfigured(format!("Error building email: {e}")))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn provider(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = self.build_message(email)?;
        let response = self.transport.send(message).await.map_err(classify_smtp_error)?;
        debug!("SMTP accepted message: {:?}", response.code());
        Ok(())
    }
}

fn classify_smtp_error(err: SmtpError) -> MailError {
    if err.is_timeout() {
        return MailError::Timeout;
    }
    match err.status().and_then(|code| code.to_string().parse::<u16>().ok()) {
        Some(code) => classify_reply_code(code, err.to_string()),
        None => MailError::Transport(err.to_string()),
    }
}

/// Maps an SMTP reply code to our error classes.
///
/// 530/534/535/538 are authentication failures. Other permanent (5xx) replies
/// mean the server refuses our sender or destination, which only a
/// configuration change can fix. Transient (4xx) replies are delivery faults.
fn classify_reply_code(code: u16, detail: String) -> MailError {
    match code {
        530 | 534 | 535 | 538 => MailError::Unauthorized(detail),
        500..=599 => MailError::Misconfigured(detail),
        _ => MailError::Transport(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: u16, from: &str) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            port,
            user: "me@example.com".into(),
            pass: "secret".into(),
            from: from.into(),
        }
    }

    fn email(reply_to: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: "owner@example.com".into(),
            reply_to: reply_to.into(),
            subject: "[Portfolio] Hi".into(),
            text: "Name: Ana\n\nHello".into(),
        }
    }

    #[test]
    fn test_reply_code_classification() {
        assert!(matches!(classify_reply_code(535, "auth".into()), MailError::Unauthorized(_)));
        assert!(matches!(classify_reply_code(553, "sender".into()), MailError::Misconfigured(_)));
        assert!(matches!(classify_reply_code(421, "busy".into()), MailError::Transport(_)));
        assert!(matches!(classify_reply_code(451, "later".into()), MailError::Transport(_)));
    }

    #[tokio::test]
    async fn test_bad_from_address_is_misconfiguration() {
        let result = SmtpMailer::new(&config(587, "not an address"), Duration::from_secs(5));
        assert!(matches!(result, Err(MailError::Misconfigured(_))));
    }

    #[tokio::test]
    async fn test_message_carries_reply_to_and_subject() {
        let mailer = SmtpMailer::new(&config(465, "Portfolio <me@example.com>"), Duration::from_secs(5)).unwrap();
        let message = mailer.build_message(&email("ana@example.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Reply-To: ana@example.com"));
        assert!(raw.contains("Subject: [Portfolio] Hi"));
        assert!(raw.contains("To: owner@example.com"));
    }

    #[tokio::test]
    async fn test_unparseable_reply_to_is_reported() {
        let mailer = SmtpMailer::new(&config(587, "me@example.com"), Duration::from_secs(5)).unwrap();
        let result = mailer.build_message(&email("ana@@example.com"));
        assert!(matches!(result, Err(MailError::InvalidReplyTo(_))));
    }
}
