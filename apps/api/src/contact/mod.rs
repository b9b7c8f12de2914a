use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::errors::AppError;

pub mod handlers;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

/// Raw contact form body. Every field is optional on the wire so that a
/// missing field becomes `MISSING_REQUIRED_FIELDS` instead of a 422.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactSubmission {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    /// Honeypot. Hidden in the form; humans leave it empty.
    pub company: Option<String>,
}

/// A submission that passed validation, with fields trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactSubmission {
    pub fn is_spam(&self) -> bool {
        self.company.as_deref().is_some_and(|c| !c.is_empty())
    }

    pub fn validate(&self) -> Result<ContactMessage, AppError> {
        let required = |field: &Option<String>| {
            field
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(AppError::MissingRequiredFields)
        };

        let message = ContactMessage {
            name: required(&self.name)?,
            email: required(&self.email)?,
            subject: required(&self.subject)?,
            message: required(&self.message)?,
        };

        if !is_valid_email(&message.email) {
            return Err(AppError::InvalidEmailFormat);
        }

        Ok(message)
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}
