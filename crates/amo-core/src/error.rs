//! Unified error types for amo-release

use std::time::Duration;
use thiserror::Error;

/// Unified error type for all release operations
#[derive(Error, Debug)]
pub enum AmoError {
    // Pre-flight errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Phase error: {0}")]
    Phase(String),

    // Driver errors
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Timed out after {elapsed:?} waiting for {what}")]
    Timeout { what: String, elapsed: Duration },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Could not navigate to {expected}, landed at {actual}")]
    NavigationMismatch { expected: String, actual: String },

    // Authentication errors
    #[error(
        "Cannot sign into {email} because 2-factor authentication is not set up for the account. \
         Set up 2FA and add the secret as the environment variable `FIREFOX_TOTP_SECRET` \
         (click \"Can't scan code?\" on the setup QR code to reveal it in plain text)."
    )]
    TwoFactorNotConfigured { email: String },

    #[error("2FA verification failed: {0}")]
    TwoFactorVerification(String),

    // Upload errors
    #[error("No upload progress after {0:?}")]
    UploadStalled(Duration),

    #[error("Timeout: uploading the add-on took longer than {0:?}")]
    UploadTimeout(Duration),

    #[error("Extension validation failed:\n{report}")]
    ValidationFailed { report: String },

    // Form errors
    #[error("Form submission failed:\n{errors}")]
    FormSubmission { errors: String },

    #[error("Unexpected outcome: {0}")]
    UnexpectedOutcome(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl AmoError {
    /// Whether a bounded retry may attempt the operation again
    pub fn is_retryable(&self) -> bool {
        matches!(self, AmoError::UploadStalled(_))
    }

    pub fn timeout(what: impl Into<String>, elapsed: Duration) -> Self {
        AmoError::Timeout {
            what: what.into(),
            elapsed,
        }
    }
}

/// Result type alias using AmoError
pub type Result<T> = std::result::Result<T, AmoError>;
