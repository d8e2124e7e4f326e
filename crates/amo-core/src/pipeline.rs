//! Release pipeline phases
//!
//! A release runs verify → prepare → publish. The pipeline value carries the
//! current phase and whatever the earlier phases produced, so calling a step
//! out of order is reported as [`AmoError::Phase`] instead of failing later
//! against the marketplace.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::info;

use crate::{AmoError, Artifacts, Credentials, Result, SubmissionContext};

pub const EMAIL_VAR: &str = "FIREFOX_EMAIL";
pub const PASSWORD_VAR: &str = "FIREFOX_PASSWORD";
pub const TOTP_SECRET_VAR: &str = "FIREFOX_TOTP_SECRET";

/// Where a release currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePhase {
    Unverified,
    Verified,
    Prepared,
    Published,
}

impl fmt::Display for ReleasePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReleasePhase::Unverified => "unverified",
            ReleasePhase::Verified => "verified",
            ReleasePhase::Prepared => "prepared",
            ReleasePhase::Published => "published",
        };
        f.write_str(name)
    }
}

/// Check that all required secrets are present and non-empty, and that the
/// 2FA secret decodes as base32.
///
/// Touches nothing but the given mapping.
pub fn verify_conditions(env: &HashMap<String, String>) -> Result<Credentials> {
    let get = |name: &str| env.get(name).filter(|v| !v.is_empty()).cloned();

    let email = get(EMAIL_VAR);
    let password = get(PASSWORD_VAR);
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AmoError::Config(format!(
            "Environment variables {} and {} must be set",
            EMAIL_VAR, PASSWORD_VAR
        )));
    };

    // Authenticator apps show the secret in space-separated groups
    let totp_secret: String = get(TOTP_SECRET_VAR)
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if totp_secret.is_empty() {
        return Err(AmoError::Config(format!(
            "Environment variable {} must be set to the account's 2FA secret",
            TOTP_SECRET_VAR
        )));
    }
    let unpadded = totp_secret.trim_end_matches('=').to_ascii_uppercase();
    if totp_rs::Secret::Encoded(unpadded).to_bytes().is_err() {
        return Err(AmoError::Config(format!(
            "Environment variable {} is not a valid base32 2FA secret",
            TOTP_SECRET_VAR
        )));
    }

    Ok(Credentials {
        email,
        password,
        totp_secret,
    })
}

/// State threaded through one release
#[derive(Debug)]
pub struct ReleasePipeline {
    phase: ReleasePhase,
    credentials: Option<Credentials>,
    artifacts: Option<Artifacts>,
}

impl Default for ReleasePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleasePipeline {
    pub fn new() -> Self {
        Self {
            phase: ReleasePhase::Unverified,
            credentials: None,
            artifacts: None,
        }
    }

    pub fn phase(&self) -> ReleasePhase {
        self.phase
    }

    fn expect_phase(&self, expected: ReleasePhase, step: &str) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(AmoError::Phase(format!(
                "{} requires the release to be {}, but it is {}",
                step, expected, self.phase
            )))
        }
    }

    /// Validate credentials from the environment
    pub fn verify(&mut self, env: &HashMap<String, String>) -> Result<()> {
        self.expect_phase(ReleasePhase::Unverified, "verify")?;
        self.credentials = Some(verify_conditions(env)?);
        self.phase = ReleasePhase::Verified;
        info!("Release conditions verified");
        Ok(())
    }

    /// Accept the packager's archives, resolved against `cwd`
    pub fn prepare(&mut self, artifacts: Artifacts, cwd: &Path) -> Result<()> {
        self.expect_phase(ReleasePhase::Verified, "prepare")?;

        let xpi_path = cwd.join(&artifacts.xpi_path);
        if !xpi_path.is_file() {
            return Err(AmoError::Config(format!(
                "Add-on archive {} does not exist",
                xpi_path.display()
            )));
        }

        let sources_path = match artifacts.sources_path {
            Some(path) => {
                let path = cwd.join(path);
                if !path.is_file() {
                    return Err(AmoError::Config(format!(
                        "Sources archive {} does not exist",
                        path.display()
                    )));
                }
                Some(path)
            }
            None => None,
        };

        info!(
            xpi = %xpi_path.display(),
            sources = ?sources_path.as_ref().map(|p| p.display().to_string()),
            "Release artifacts prepared"
        );
        self.artifacts = Some(Artifacts {
            xpi_path,
            sources_path,
        });
        self.phase = ReleasePhase::Prepared;
        Ok(())
    }

    /// Build the input bundle for the publish workflow
    pub fn submission(
        &self,
        addon_slug: &str,
        release_notes: &str,
        reviewer_notes: Option<&str>,
        base_url: &str,
    ) -> Result<SubmissionContext> {
        self.expect_phase(ReleasePhase::Prepared, "publish")?;

        let (Some(credentials), Some(artifacts)) = (&self.credentials, &self.artifacts) else {
            return Err(AmoError::Phase(
                "release is prepared but credentials or artifacts are missing".to_string(),
            ));
        };

        Ok(SubmissionContext {
            addon_slug: addon_slug.to_string(),
            artifacts: artifacts.clone(),
            release_notes: release_notes.to_string(),
            reviewer_notes: reviewer_notes.map(str::to_string),
            credentials: credentials.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn mark_published(&mut self) -> Result<()> {
        self.expect_phase(ReleasePhase::Prepared, "mark_published")?;
        self.phase = ReleasePhase::Published;
        Ok(())
    }
}
