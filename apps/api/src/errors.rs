use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// The `error` code in the body is a stable contract with the front-end, which
/// maps it to a localized message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required fields")]
    MissingRequiredFields,

    #[error("Invalid email format")]
    InvalidEmailFormat,

    #[error("Too many requests, retry after {retry_after_seconds}s")]
    TooManyRequests { retry_after_seconds: u64 },

    #[error("Contact service unavailable: {0}")]
    ContactServiceUnavailable(String),

    #[error("Email delivery failed: {0}")]
    EmailDeliveryFailed(String),

    #[error("CV not found: {0}")]
    CvNotFound(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingRequiredFields => "MISSING_REQUIRED_FIELDS",
            AppError::InvalidEmailFormat => "INVALID_EMAIL_FORMAT",
            AppError::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            AppError::ContactServiceUnavailable(_) => "CONTACT_SERVICE_UNAVAILABLE",
            AppError::EmailDeliveryFailed(_) => "EMAIL_DELIVERY_FAILED",
            AppError::CvNotFound(_) => "CV_NOT_FOUND",
            AppError::NotFound => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingRequiredFields | AppError::InvalidEmailFormat => StatusCode::BAD_REQUEST,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ContactServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::EmailDeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::CvNotFound(_) | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::MissingRequiredFields => "Name, email, subject and message are required".to_string(),
            AppError::InvalidEmailFormat => "The email address is not valid".to_string(),
            AppError::TooManyRequests { .. } => "Too many messages, please wait before retrying".to_string(),
            AppError::ContactServiceUnavailable(detail) => {
                tracing::error!("Contact service unavailable: {detail}");
                "The contact service is temporarily unavailable, please try later or email me directly"
                    .to_string()
            }
            AppError::EmailDeliveryFailed(detail) => {
                tracing::error!("Email delivery failed: {detail}");
                "The message could not be delivered, please try again later".to_string()
            }
            AppError::CvNotFound(detail) => {
                tracing::info!("CV not found: {detail}");
                "No CV is available for download".to_string()
            }
            AppError::NotFound => "Resource not found".to_string(),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
        };

        if let AppError::TooManyRequests { retry_after_seconds } = self {
            let body = Json(json!({
                "error": code,
                "message": message,
                "retryAfterSeconds": retry_after_seconds,
            }));
            let mut response = (status, body).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_seconds));
            return response;
        }

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_too_many_requests_sets_header_and_field() {
        let response = AppError::TooManyRequests {
            retry_after_seconds: 42,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
        let json = body_json(response).await;
        assert_eq!(json["error"], "TOO_MANY_REQUESTS");
        assert_eq!(json["retryAfterSeconds"], 42);
    }

    #[tokio::test]
    async fn test_upstream_detail_is_not_leaked() {
        let response =
            AppError::ContactServiceUnavailable("535 authentication rejected for bob".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"], "CONTACT_SERVICE_UNAVAILABLE");
        assert!(!json["message"].as_str().unwrap().contains("bob"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::MissingRequiredFields.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidEmailFormat.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::EmailDeliveryFailed("timeout".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(AppError::CvNotFound("es".into()).status(), StatusCode::NOT_FOUND);
    }
}
