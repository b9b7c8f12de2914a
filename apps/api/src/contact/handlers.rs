use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::contact::ContactSubmission;
use crate::errors::AppError;
use crate::mail::{MailError, OutgoingEmail};
use crate::rate_limit::{rate_limit_key, RateLimitDecision};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<&'static str>,
}

/// POST /api/contact
pub async fn handle_contact(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<ContactSubmission>, JsonRejection>,
) -> Result<Json<ContactResponse>, AppError> {
    let Json(submission) = payload.map_err(|rejection| {
        warn!("Rejected contact body: {rejection}");
        AppError::MissingRequiredFields
    })?;

    if submission.is_spam() {
        info!("Honeypot field filled; dropping contact submission");
        return Ok(Json(ContactResponse {
            ok: true,
            provider: None,
        }));
    }

    let message = submission.validate()?;

    let client = client_identity(
        &headers,
        connect_info.map(|ConnectInfo(addr)| addr),
        state.config.trust_proxy,
    );
    let key = rate_limit_key(&client, &message.email);
    let decision = state.rate_limiter.check_and_record(&key).await;
    if let Some(retry_after_seconds) = decision.retry_after_seconds() {
        warn!("Contact rate limit hit for client {client}; retry in {retry_after_seconds}s");
        return Err(AppError::TooManyRequests { retry_after_seconds });
    }
    if let RateLimitDecision::Allowed { remaining } = decision {
        debug!("Contact submission accepted for rate limiting, {remaining} left in window");
    }

    let mailer = state.mailer.as_ref().ok_or_else(|| {
        AppError::ContactServiceUnavailable("no mail provider configured".to_string())
    })?;
    let to = state.config.contact_to_email.as_deref().ok_or_else(|| {
        AppError::ContactServiceUnavailable("CONTACT_TO_EMAIL is not set".to_string())
    })?;

    let email = OutgoingEmail::from_contact(&message, to, Utc::now());
    mailer.send(&email).await.map_err(|err| match err {
        MailError::InvalidReplyTo(detail) => {
            warn!("Mail provider rejected reply-to address: {detail}");
            AppError::InvalidEmailFormat
        }
        err if err.is_unavailable() => AppError::ContactServiceUnavailable(format!(
            "{} provider: {err}",
            mailer.provider()
        )),
        err => AppError::EmailDeliveryFailed(format!("{} provider: {err}", mailer.provider())),
    })?;

    info!("Contact message delivered via {}", mailer.provider());

    Ok(Json(ContactResponse {
        ok: true,
        provider: Some(mailer.provider()),
    }))
}

/// Identifies the submitting client for rate limiting.
///
/// Forwarded headers are only honored behind a trusted proxy; otherwise any
/// client could rotate them to dodge the limit.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded.or(real_ip) {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some("203.0.113.7:51000".parse().unwrap())
    }

    #[test]
    fn test_peer_address_without_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.1"));
        assert_eq!(client_identity(&headers, peer(), false), "203.0.113.7");
    }

    #[test]
    fn test_first_forwarded_address_behind_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.1, 10.0.0.2"),
        );
        assert_eq!(client_identity(&headers, peer(), true), "198.51.100.1");
    }

    #[test]
    fn test_real_ip_then_peer_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_identity(&headers, peer(), true), "203.0.113.7");
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.9"));
        assert_eq!(client_identity(&headers, peer(), true), "198.51.100.9");
    }

    #[test]
    fn test_unknown_without_peer() {
        assert_eq!(client_identity(&HeaderMap::new(), None, false), "unknown");
    }
}
