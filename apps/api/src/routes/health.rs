use axum::Json;
use serde_json::{json, Value};

/// GET /health
/// Does not probe mail or CV settings.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": "portfolio-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
