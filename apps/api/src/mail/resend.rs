use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MailError, Mailer, OutgoingEmail};
use crate::config::ResendConfig;

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    reply_to: &'a str,
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResendErrorBody {
    message: String,
}

/// Resend transactional email API client.
#[derive(Clone)]
pub struct ResendMailer {
    client: Client,
    api_key: String,
    api_url: String,
    from: String,
}

impl ResendMailer {
    pub fn new(config: &ResendConfig, timeout: Duration) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Misconfigured(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    fn provider(&self) -> &'static str {
        "resend"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let body = SendEmailRequest {
            from: &self.from,
            to: [email.to.as_str()],
            reply_to: &email.reply_to,
            subject: &email.subject,
            text: &email.text,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MailError::Timeout
                } else {
                    MailError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ResendErrorBody>(&text)
                .map(|e| e.message)
                .unwrap_or(text);
            return Err(classify_status(status, message));
        }

        let sent: SendEmailResponse = response.json().await.unwrap_or(SendEmailResponse { id: None });
        debug!("Resend accepted message id={:?}", sent.id);
        Ok(())
    }
}

/// 401/403 mean a bad key or unverified sender domain; 400/422 a payload the
/// API will never accept with the current settings. Rate limiting and 5xx are
/// delivery faults.
fn classify_status(status: StatusCode, message: String) -> MailError {
    let detail = format!("Resend API returned {status}: {message}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MailError::Unauthorized(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::NOT_FOUND => {
            MailError::Misconfigured(detail)
        }
        _ => MailError::Transport(detail),
    }
}
