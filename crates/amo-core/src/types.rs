//! Core domain types for a marketplace release

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Account credentials for the marketplace
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    /// Base32 seed for time-based one-time passwords, whitespace removed
    pub totp_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("totp_secret", &"<redacted>")
            .finish()
    }
}

/// Archives produced by the packaging step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    /// Installable archive (.xpi)
    pub xpi_path: PathBuf,
    /// Source archive; `None` means no source is submitted
    pub sources_path: Option<PathBuf>,
}

/// Everything one publish needs. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct SubmissionContext {
    /// Add-on slug as in `https://addons.mozilla.org/en-US/firefox/addon/SLUG/`
    pub addon_slug: String,
    pub artifacts: Artifacts,
    pub release_notes: String,
    /// Submitted with every version, e.g. a link to the source repository
    pub reviewer_notes: Option<String>,
    pub credentials: Credentials,
    /// Marketplace base URL without trailing slash
    pub base_url: String,
}

impl SubmissionContext {
    pub fn xpi_path(&self) -> &PathBuf {
        &self.artifacts.xpi_path
    }

    pub fn sources_path(&self) -> Option<&PathBuf> {
        self.artifacts.sources_path.as_ref()
    }
}

/// Terminal state of the marketplace's validation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Pass,
    Fail,
}

impl UploadStatus {
    /// Classify the class attribute of the status-results element
    pub fn from_class_list(class_list: &str) -> Self {
        let mut status = UploadStatus::Pending;
        for class in class_list.split_whitespace() {
            match class {
                "status-fail" => return UploadStatus::Fail,
                "status-pass" => status = UploadStatus::Pass,
                _ => {}
            }
        }
        status
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Pending)
    }
}

/// Marketplace-assigned id of an in-progress version submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionId(pub u64);

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Published release, handed back to the release pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub name: String,
    pub url: String,
}
