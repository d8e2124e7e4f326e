//! Add-on upload and validation polling
//!
//! Selecting the .xpi starts an upload that the page follows with a progress
//! line, then a server-side validation job. When the job finishes, the
//! status-results element gets a `status-pass` or `status-fail` class and
//! shows the validation summary.
//!
//! Uploads sometimes hang without any progress. An attempt that shows no
//! progress for the stall timeout is abandoned, the page is reloaded and the
//! file uploaded again, up to the configured number of attempts. Independent
//! of attempts left, the whole upload fails once the total timeout has passed
//! since the first attempt started.

use crate::page::Page;
use crate::report::{html_to_markdown, normalize_progress};
use crate::selectors::*;
use amo_core::{retry_with_hook, AmoError, ReleaseConfig, Result, RetryPolicy, UploadStatus};
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Timing and retry policy for one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub poll_interval: Duration,
    pub settle: Duration,
    pub element_timeout: Duration,
    pub stall: Duration,
    pub total: Duration,
    pub attempts: usize,
}

impl UploadPolicy {
    pub fn from_config(config: &ReleaseConfig) -> Self {
        let timeouts = &config.timeouts;
        Self {
            poll_interval: timeouts.poll_interval(),
            settle: timeouts.upload_settle(),
            element_timeout: timeouts.navigation(),
            stall: timeouts.stall(),
            total: timeouts.upload_total(),
            attempts: config.upload_attempts,
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from_config(&ReleaseConfig::default())
    }
}

/// Outcome of a validation job that passed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub status: UploadStatus,
    /// Validation summary as Markdown
    pub summary: String,
}

/// Upload `xpi` on the submit page and wait for validation to pass.
///
/// Fails with `ValidationFailed` carrying the summary if validation fails.
pub async fn upload_and_validate<P>(
    page: &P,
    xpi: &Path,
    policy: &UploadPolicy,
) -> Result<ValidationReport>
where
    P: Page + ?Sized,
{
    let started = Instant::now();

    let status = retry_with_hook(
        "xpi upload",
        RetryPolicy::attempts(policy.attempts),
        |attempt| upload_attempt(page, xpi, policy, started, attempt),
        |_| async move {
            info!("Reloading and retrying...");
            page.reload().await
        },
    )
    .await?;
    info!("xpi upload finished");

    let html = page
        .inner_html(UPLOAD_STATUS_RESULTS)
        .await?
        .unwrap_or_default();
    let summary = html_to_markdown(&html);
    info!("Validation summary:\n{}", summary);

    if status == UploadStatus::Fail {
        return Err(AmoError::ValidationFailed { report: summary });
    }
    info!("Validation passed");
    Ok(ValidationReport { status, summary })
}

async fn upload_attempt<P>(
    page: &P,
    xpi: &Path,
    policy: &UploadPolicy,
    started: Instant,
    attempt: usize,
) -> Result<UploadStatus>
where
    P: Page + ?Sized,
{
    if started.elapsed() >= policy.total {
        return Err(AmoError::UploadTimeout(policy.total));
    }

    sleep(policy.settle).await;
    let remaining = policy.total.saturating_sub(started.elapsed());
    match page
        .wait_for_selector(ADDON_FILE_INPUT, policy.element_timeout.min(remaining))
        .await
    {
        Err(AmoError::Timeout { .. }) if started.elapsed() >= policy.total => {
            return Err(AmoError::UploadTimeout(policy.total));
        }
        waited => waited?,
    }
    sleep(policy.settle).await;

    info!(attempt, "Uploading xpi {}", xpi.display());
    page.upload_file(ADDON_FILE_INPUT, xpi).await?;

    poll_validation(page, policy, started).await
}

/// Poll until the status class is terminal, the attempt stalls, or the total
/// upload time runs out
async fn poll_validation<P>(
    page: &P,
    policy: &UploadPolicy,
    started: Instant,
) -> Result<UploadStatus>
where
    P: Page + ?Sized,
{
    let mut quiet_since = Instant::now();
    let mut last_progress: Option<String> = None;

    loop {
        let progress = page
            .text_content(UPLOAD_PROGRESS)
            .await?
            .map(|text| normalize_progress(&text));
        match &progress {
            None => debug!("No upload status yet"),
            Some(text) if last_progress.as_ref() != Some(text) => {
                info!("Upload progress: {}", text)
            }
            Some(_) => {}
        }

        let class = page
            .attribute(UPLOAD_STATUS_RESULTS, "class")
            .await?
            .unwrap_or_default();
        let status = UploadStatus::from_class_list(&class);
        if status.is_terminal() {
            return Ok(status);
        }

        if progress.as_deref().is_some_and(|text| !text.is_empty()) {
            quiet_since = Instant::now();
        }
        last_progress = progress;

        sleep(policy.poll_interval).await;

        if started.elapsed() >= policy.total {
            return Err(AmoError::UploadTimeout(policy.total));
        }
        if quiet_since.elapsed() >= policy.stall {
            info!("No upload progress after {:?}", policy.stall);
            return Err(AmoError::UploadStalled(policy.stall));
        }
    }
}
