//! Page capability used by the publish workflow
//!
//! The workflow stages never talk to Chrome directly. They drive a [`Page`],
//! which is implemented by [`crate::BrowserSession`] for real runs and by an
//! in-memory marketplace in tests.
//!
//! Implementations must apply one operation at a time: every method completes
//! before the caller issues the next one.

use amo_core::{AmoError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// How often [`wait_for_url`] re-reads the location
pub const URL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Typed operations against the one page a session owns
#[async_trait]
pub trait Page: Send + Sync {
    /// Load `url` and wait until the navigation completes
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Wait until `selector` matches an element, or fail with `Timeout`
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Whether `selector` matches an element right now
    async fn exists(&self, selector: &str) -> Result<bool>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Click `selector` and wait for the navigation it triggers.
    ///
    /// The navigation listener is armed before the click, so a fast
    /// navigation cannot be missed.
    async fn click_and_wait_for_navigation(&self, selector: &str, timeout: Duration)
        -> Result<()>;

    /// Set the value of an input or textarea
    async fn set_value(&self, selector: &str, value: &str) -> Result<()>;

    /// Select `path` in a file input
    async fn upload_file(&self, selector: &str, path: &Path) -> Result<()>;

    /// Text content of the first match, `None` if nothing matches
    async fn text_content(&self, selector: &str) -> Result<Option<String>>;

    /// Inner HTML of the first match, `None` if nothing matches
    async fn inner_html(&self, selector: &str) -> Result<Option<String>>;

    /// Attribute of the first match, `None` if nothing matches or the
    /// attribute is absent
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;

    async fn reload(&self) -> Result<()>;

    /// Release the page and its browser. Called exactly once per session.
    async fn close(&self) -> Result<()>;
}

/// Poll the page location until `predicate` accepts it.
///
/// Returns the accepted URL, or `Timeout` describing `what` was awaited.
pub async fn wait_for_url<P, F>(
    page: &P,
    what: &str,
    timeout: Duration,
    predicate: F,
) -> Result<String>
where
    P: Page + ?Sized,
    F: Fn(&str) -> bool,
{
    let start = Instant::now();
    loop {
        let url = page.current_url().await?;
        if predicate(&url) {
            return Ok(url);
        }
        if start.elapsed() >= timeout {
            return Err(AmoError::timeout(what, timeout));
        }
        sleep(URL_POLL_INTERVAL).await;
    }
}
