use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::cv::Lang;

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com/emails";
const DEFAULT_CV_DIRS: &str = "./storage/cv,./public";
const DEFAULT_STATIC_DIR: &str = "./client/dist";

/// Application configuration loaded from environment variables.
///
/// Only malformed values fail startup. Missing mail settings are tolerated and
/// surface as `CONTACT_SERVICE_UNAVAILABLE` when a submission arrives.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub frontend_url: Option<String>,
    pub allowed_origins: Vec<String>,
    pub contact_to_email: Option<String>,
    pub mail_provider: Option<MailProvider>,
    pub smtp: Option<SmtpConfig>,
    pub resend: Option<ResendConfig>,
    pub mail_timeout: Duration,
    pub cv_dirs: Vec<PathBuf>,
    pub cv_manifest: HashMap<Lang, PathBuf>,
    pub static_dir: PathBuf,
    pub trust_proxy: bool,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailProvider {
    Smtp,
    Resend,
}

impl TryFrom<&str> for MailProvider {
    type Error = anyhow::Error;

    fn try_from(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "smtp" => Ok(Self::Smtp),
            "resend" => Ok(Self::Resend),
            other => bail!("MAIL_PROVIDER '{other}' is not supported. Use either `smtp` or `resend`."),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl SmtpConfig {
    /// Port 465 speaks TLS from the first byte; everything else upgrades with STARTTLS.
    pub fn implicit_tls(&self) -> bool {
        self.port == 465
    }
}

#[derive(Debug, Clone)]
pub struct ResendConfig {
    pub api_key: String,
    pub from: String,
    pub api_url: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 3,
            window: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let frontend_url = get("FRONTEND_URL").map(|u| u.trim_end_matches('/').to_string());

        let mut allowed_origins: Vec<String> = frontend_url.iter().cloned().collect();
        for origin in split_list(get("ALLOWED_ORIGINS").as_deref().unwrap_or_default()) {
            let origin = origin.trim_end_matches('/').to_string();
            if !allowed_origins.contains(&origin) {
                allowed_origins.push(origin);
            }
        }

        let smtp = match (get("SMTP_HOST"), get("SMTP_USER"), get("SMTP_PASS")) {
            (Some(host), Some(user), Some(pass)) => {
                let port = parse_or("SMTP_PORT", get("SMTP_PORT"), DEFAULT_SMTP_PORT)?;
                let from = get("SMTP_FROM").unwrap_or_else(|| user.clone());
                Some(SmtpConfig {
                    host,
                    port,
                    user,
                    pass,
                    from,
                })
            }
            _ => None,
        };

        let resend = match (get("RESEND_API_KEY"), get("RESEND_FROM")) {
            (Some(api_key), Some(from)) => Some(ResendConfig {
                api_key,
                from,
                api_url: get("RESEND_API_URL").unwrap_or_else(|| DEFAULT_RESEND_API_URL.to_string()),
            }),
            _ => None,
        };

        let mail_provider = get("MAIL_PROVIDER")
            .map(|p| MailProvider::try_from(p.as_str()))
            .transpose()?;

        let mut cv_manifest = HashMap::new();
        for (key, lang) in [("CV_FILE_EN", Lang::En), ("CV_FILE_ES", Lang::Es)] {
            if let Some(path) = get(key) {
                cv_manifest.insert(lang, PathBuf::from(path));
            }
        }

        let cv_dirs = split_list(get("CV_STORAGE_PATH").as_deref().unwrap_or(DEFAULT_CV_DIRS))
            .map(PathBuf::from)
            .collect();

        let rate_limit = RateLimitConfig {
            max_requests: parse_or(
                "CONTACT_RATE_LIMIT_MAX",
                get("CONTACT_RATE_LIMIT_MAX"),
                RateLimitConfig::default().max_requests,
            )?,
            window: Duration::from_secs(parse_or(
                "CONTACT_RATE_LIMIT_WINDOW_SECONDS",
                get("CONTACT_RATE_LIMIT_WINDOW_SECONDS"),
                RateLimitConfig::default().window.as_secs(),
            )?),
        };
        if rate_limit.max_requests == 0 || rate_limit.window.is_zero() {
            bail!("Contact rate limit and window must both be greater than zero");
        }

        Ok(Config {
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            frontend_url,
            allowed_origins,
            contact_to_email: get("CONTACT_TO_EMAIL"),
            mail_provider,
            smtp,
            resend,
            mail_timeout: Duration::from_secs(parse_or(
                "MAIL_TIMEOUT_SECONDS",
                get("MAIL_TIMEOUT_SECONDS"),
                15,
            )?),
            cv_dirs,
            cv_manifest,
            static_dir: PathBuf::from(get("STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string())),
            trust_proxy: get("TRUST_PROXY")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            rate_limit,
        })
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
