//! Publish workflow: one browser session driven through every stage
//!
//! Stages run strictly in order: sign-in, upload and validation, the form
//! sequence, then the result report. The session is closed exactly once
//! whether the stages succeed or not.

use crate::auth::authenticate;
use crate::browser::BrowserSession;
use crate::page::Page;
use crate::report::release_info;
use crate::selectors::MarketplaceUrls;
use crate::submission::submit_version;
use crate::upload::{upload_and_validate, UploadPolicy};
use amo_core::{ReleaseConfig, ReleaseInfo, Result, SubmissionContext};
use tracing::{info, warn};

/// Publish one version in a freshly launched browser
pub async fn publish(ctx: &SubmissionContext, config: &ReleaseConfig) -> Result<ReleaseInfo> {
    let session = BrowserSession::launch(&config.browser, config.timeouts.navigation()).await?;
    publish_with(&session, ctx, config).await
}

/// Publish one version on `page`, closing it afterwards
pub async fn publish_with<P>(
    page: &P,
    ctx: &SubmissionContext,
    config: &ReleaseConfig,
) -> Result<ReleaseInfo>
where
    P: Page + ?Sized,
{
    let outcome = run_stages(page, ctx, config).await;
    let closed = page.close().await;

    match (outcome, closed) {
        (Ok(info), Ok(())) => Ok(info),
        (Ok(info), Err(e)) => {
            warn!("Failed to close browser after publishing: {}", e);
            Ok(info)
        }
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                warn!("Failed to close browser: {}", close_err);
            }
            Err(e)
        }
    }
}

async fn run_stages<P>(
    page: &P,
    ctx: &SubmissionContext,
    config: &ReleaseConfig,
) -> Result<ReleaseInfo>
where
    P: Page + ?Sized,
{
    let urls = MarketplaceUrls::new(&ctx.base_url, &ctx.addon_slug);

    authenticate(page, &ctx.credentials, &urls.submit(), &config.timeouts).await?;

    let policy = UploadPolicy::from_config(config);
    upload_and_validate(page, ctx.xpi_path(), &policy).await?;

    let version = submit_version(page, ctx, &config.timeouts).await?;
    info!("Published {}", urls.developer_version(version));

    Ok(release_info(&urls))
}
