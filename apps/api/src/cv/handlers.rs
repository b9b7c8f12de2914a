use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, Request},
    response::Response,
};
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{info, warn};

use crate::cv::Lang;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CvQuery {
    pub lang: Option<String>,
}

/// GET /api/cv/download?lang=en|es
pub async fn handle_cv_download(
    State(state): State<AppState>,
    query: Result<Query<CvQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    // A repeated or undecodable `lang` is as unusable as an unknown one.
    let Query(query) = query.map_err(|rejection| {
        warn!("Rejected CV query: {rejection}");
        AppError::CvNotFound(format!("unreadable query: {rejection}"))
    })?;

    let lang = match query.lang.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        Some(raw) => Some(
            Lang::parse(raw).ok_or_else(|| AppError::CvNotFound(format!("unsupported language '{raw}'")))?,
        ),
        None => None,
    };

    let file = state.cv_locator.locate(lang).await.ok_or_else(|| {
        AppError::CvNotFound(format!(
            "no CV for lang={} in {:?}",
            lang.map(|l| l.as_str()).unwrap_or("any"),
            state.cv_locator.dirs()
        ))
    })?;

    let download_name = file.download_name();
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{download_name}\""))
        .map_err(|e| anyhow::anyhow!("invalid content-disposition: {e}"))?;

    // ServeFile streams the file from disk in chunks instead of buffering it.
    let response = match ServeFile::new(&file.path).oneshot(Request::new(Body::empty())).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    if !response.status().is_success() {
        return Err(AppError::CvNotFound(format!(
            "{} disappeared before it could be served",
            file.path.display()
        )));
    }

    let (mut parts, body) = response.into_parts();
    info!(
        "Serving CV {} from {} ({} bytes) as {download_name}",
        file.file_name,
        file.source_dir.display(),
        parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("?")
    );

    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    parts.headers.insert(header::CONTENT_DISPOSITION, disposition);
    parts
        .headers
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok(Response::from_parts(parts, Body::new(body)))
}
