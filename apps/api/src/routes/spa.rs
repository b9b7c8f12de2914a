//! Serves the built front-end, or points visitors at where it is hosted.

use axum::{
    extract::State,
    http::Uri,
    response::{IntoResponse, Redirect, Response},
    Router,
};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::state::AppState;

/// Installs the non-API fallback.
///
/// With `STATIC_DIR/index.html` present, files are served from disk and
/// unknown paths get `index.html` so client-side routes resolve. Otherwise
/// requests redirect to `FRONTEND_URL`, or 404 when that is unset too.
pub fn attach(router: Router<AppState>, config: &Config) -> Router<AppState> {
    let index = config.static_dir.join("index.html");
    if index.is_file() {
        info!("Serving static assets from {}", config.static_dir.display());
        return router.fallback_service(ServeDir::new(&config.static_dir).fallback(ServeFile::new(index)));
    }

    match &config.frontend_url {
        Some(url) => info!("No static assets in {}; redirecting to {url}", config.static_dir.display()),
        None => warn!(
            "No static assets in {} and FRONTEND_URL is unset; non-API paths will 404",
            config.static_dir.display()
        ),
    }
    router.fallback(redirect_to_frontend)
}

async fn redirect_to_frontend(State(state): State<AppState>, uri: Uri) -> Response {
    match &state.config.frontend_url {
        Some(base) => {
            let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
            Redirect::temporary(&format!("{base}{target}")).into_response()
        }
        None => AppError::NotFound.into_response(),
    }
}
