use std::sync::Arc;

use crate::config::Config;
use crate::cv::CvLocator;
use crate::mail::{build_mailer, MailError, Mailer};
use crate::rate_limit::{RateLimitStore, SlidingWindowLimiter};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Contact throttling. In-memory by default; swap for a shared store when
    /// running more than one instance.
    pub rate_limiter: Arc<dyn RateLimitStore>,
    /// `None` when no mail provider is configured.
    pub mailer: Option<Arc<dyn Mailer>>,
    pub cv_locator: CvLocator,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self, MailError> {
        let mailer = build_mailer(&config)?;
        Ok(Self {
            rate_limiter: Arc::new(SlidingWindowLimiter::new(config.rate_limit)),
            mailer,
            cv_locator: CvLocator::new(config.cv_dirs.clone(), config.cv_manifest.clone()),
            config,
        })
    }
}
