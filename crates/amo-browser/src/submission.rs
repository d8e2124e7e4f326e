//! Post-upload form sequence
//!
//! After validation passes, a version goes through three more pages, each
//! addressed by the version id the marketplace assigned on the first POST:
//! `submit/{id}/source`, `submit/{id}/details` and `submit/{id}/finish`.
//! Every submit is a navigation, and the next page is only touched after it
//! completes.

use crate::page::Page;
use crate::report::html_to_markdown;
use crate::selectors::*;
use amo_core::{AmoError, Result, SubmissionContext, Timeouts, VersionId};
use std::path::Path;
use tracing::{error, info};

/// Walk the form pages after a passed upload.
///
/// Returns the version id read from the finish page's location.
pub async fn submit_version<P>(
    page: &P,
    ctx: &SubmissionContext,
    timeouts: &Timeouts,
) -> Result<VersionId>
where
    P: Page + ?Sized,
{
    finish_upload(page, timeouts).await?;
    submit_source(page, ctx.sources_path().map(|p| p.as_path()), timeouts).await?;
    check_form_errors(page).await?;
    info!("Submission successful");

    submit_details(page, &ctx.release_notes, ctx.reviewer_notes.as_deref(), timeouts).await?;
    verify_finish(page).await
}

async fn finish_upload<P: Page + ?Sized>(page: &P, timeouts: &Timeouts) -> Result<()> {
    info!("Submitting form");
    info!("Waiting for being redirected...");
    page.wait_for_selector(UPLOAD_FINISH, timeouts.navigation())
        .await?;
    page.click_and_wait_for_navigation(UPLOAD_FINISH, timeouts.navigation())
        .await
}

/// Answer the source disclosure question and submit the step
async fn submit_source<P: Page + ?Sized>(
    page: &P,
    sources: Option<&Path>,
    timeouts: &Timeouts,
) -> Result<()> {
    info!("Waiting for \"Do You Need to Submit Source Code?\" form to appear...");
    page.wait_for_selector(HAS_SOURCE_INPUT, timeouts.navigation())
        .await?;

    match sources {
        Some(path) => {
            info!("Answering yes to \"Do You Need to Submit Source Code?\"");
            page.click(HAS_SOURCE_YES).await?;
            page.wait_for_selector(SOURCE_FILE_INPUT, timeouts.navigation())
                .await?;
            info!("Selecting sources archive {}", path.display());
            page.upload_file(SOURCE_FILE_INPUT, path).await?;
            info!("Submitting form");
            info!("Waiting for sources to upload...");
        }
        None => {
            info!("Answering no to \"Do You Need to Submit Source Code?\"");
            page.click(HAS_SOURCE_NO).await?;
            info!("Submitting form");
            info!("Waiting for being redirected...");
        }
    }

    page.click_and_wait_for_navigation(SOURCE_SUBMIT, timeouts.source_submit())
        .await
}

/// Fail with the rendered error list if the source step was rejected
async fn check_form_errors<P: Page + ?Sized>(page: &P) -> Result<()> {
    let Some(html) = page.inner_html(FORM_ERROR_LIST).await? else {
        return Ok(());
    };
    let errors = html_to_markdown(&html);
    if errors.is_empty() {
        return Ok(());
    }
    error!("Error list:\n{}", errors);
    Err(AmoError::FormSubmission { errors })
}

async fn submit_details<P: Page + ?Sized>(
    page: &P,
    release_notes: &str,
    reviewer_notes: Option<&str>,
    timeouts: &Timeouts,
) -> Result<()> {
    // Only the first locale's textarea is filled
    info!("Adding release notes");
    page.wait_for_selector(RELEASE_NOTES_INPUT, timeouts.navigation())
        .await?;
    page.set_value(RELEASE_NOTES_INPUT, release_notes).await?;

    if let Some(notes) = reviewer_notes.filter(|n| !n.is_empty()) {
        info!("Adding notes to reviewer");
        page.set_value(REVIEWER_NOTES_INPUT, notes).await?;
    }

    info!("Submitting details form");
    page.click_and_wait_for_navigation(DETAILS_SUBMIT, timeouts.navigation())
        .await
}

/// Check the confirmation on the finish page and read the version id
async fn verify_finish<P: Page + ?Sized>(page: &P) -> Result<VersionId> {
    let report = page
        .inner_html(SUBMISSION_RESULT)
        .await?
        .map(|html| html_to_markdown(&html))
        .unwrap_or_default();
    if !report.is_empty() {
        info!("Report:\n{}", report);
    }
    if !report.to_lowercase().contains("version submitted") {
        return Err(AmoError::UnexpectedOutcome(
            "the finish page did not confirm the submitted version".to_string(),
        ));
    }
    info!("Details submission successful");

    let url = page.current_url().await?;
    finish_version_id(&url).ok_or_else(|| {
        AmoError::UnexpectedOutcome(format!("no version id in finish page location {}", url))
    })
}
