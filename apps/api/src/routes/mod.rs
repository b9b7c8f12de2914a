pub mod health;
pub mod spa;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{any, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::contact::handlers::handle_contact;
use crate::cv::handlers::handle_cv_download;
use crate::errors::AppError;
use crate::state::AppState;

async fn api_not_found() -> AppError {
    AppError::NotFound
}

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/contact", post(handle_contact))
        .route("/api/cv/download", get(handle_cv_download))
        .route("/api/*rest", any(api_not_found));

    spa::attach(router, &state.config).with_state(state)
}

/// CORS restricted to the configured front-end origins.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([header::RETRY_AFTER, header::CONTENT_DISPOSITION])
}
