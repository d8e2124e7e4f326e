//! Browser lifecycle management using Chrome DevTools Protocol

use crate::page::Page;
use amo_core::{AmoError, BrowserSettings, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Keep the DevTools connection open across the longest stage wait
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// How often a pending navigation is checked
const NAVIGATION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Set on `window` before a click; a new document no longer has it
const NAVIGATION_MARKER: &str = "__amoNavigationPending";

/// Active browser session with Chrome DevTools Protocol
pub struct BrowserSession {
    /// Underlying browser instance; dropping it kills the Chrome process
    #[allow(dead_code)]
    browser: Browser,
    /// The one tab this session drives
    tab: Arc<Tab>,
    closed: AtomicBool,
}

/// Whether Chrome's sandbox should stay on.
///
/// Chrome refuses to start sandboxed as root, and most CI containers run as
/// root without the kernel features the sandbox needs.
pub fn sandbox_enabled(settings: &BrowserSettings) -> bool {
    settings
        .sandbox
        .unwrap_or_else(|| default_sandbox(running_as_root(), std::env::var_os("CI").is_some()))
}

fn default_sandbox(root: bool, ci: bool) -> bool {
    !(root || ci)
}

#[cfg(unix)]
fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

/// One line of page console output, as `TYPE text`
fn console_line<I>(kind: &str, args: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let text: Vec<String> = args.into_iter().collect();
    format!("{} {}", kind, text.join(" "))
}

/// Forward the page's console calls to the log
fn forward_console(tab: &Tab) -> Result<()> {
    tab.enable_runtime()
        .map_err(|e| AmoError::Browser(format!("Failed to enable runtime events: {}", e)))?;

    tab.add_event_listener(Arc::new(|event: &Event| {
        if let Event::RuntimeConsoleAPICalled(call) = event {
            let kind = format!("{:?}", call.params.Type).to_lowercase();
            let args = call.params.args.iter().map(|arg| match &arg.value {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => arg.description.clone().unwrap_or_default(),
            });
            debug!("Console: {}", console_line(&kind, args));
        }
    }))
    .map_err(|e| AmoError::Browser(format!("Failed to listen for console output: {}", e)))?;

    Ok(())
}

impl BrowserSession {
    /// Launch browser with the given settings
    ///
    /// `timeout` becomes the tab's default wait for element lookups and
    /// navigations.
    pub async fn launch(settings: &BrowserSettings, timeout: Duration) -> Result<Self> {
        let sandbox = sandbox_enabled(settings);
        info!(
            "Launching browser (headless: {}, sandbox: {}, size: {}x{})",
            settings.headless, sandbox, settings.window_width, settings.window_height
        );
        if !sandbox {
            info!("Disabling Chrome sandbox");
        }

        let user_agent_arg = settings
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));
        let mut args: Vec<&OsStr> = Vec::new();
        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(settings.headless)
            .sandbox(sandbox)
            .window_size(Some((settings.window_width, settings.window_height)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(args)
            .build()
            .map_err(|e| AmoError::Browser(format!("Failed to launch browser: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| AmoError::Browser(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| AmoError::Browser(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(timeout);
        forward_console(&tab)?;

        info!("Browser launched successfully");

        Ok(Self {
            browser,
            tab,
            closed: AtomicBool::new(false),
        })
    }

    /// Execute JavaScript in the page context
    ///
    /// # Returns
    /// JSON result from JavaScript execution, `Null` for `undefined`
    pub fn evaluate_script(&self, script: &str) -> Result<Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| AmoError::Browser(format!("JavaScript evaluation failed: {}", e)))?;

        Ok(result.value.unwrap_or(Value::Null))
    }

    /// Evaluate `expression(el)` against the first match of `selector`,
    /// yielding `null` when nothing matches
    fn query(&self, selector: &str, expression: &str) -> Result<Value> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? {} : null; }})()",
            json!(selector),
            expression
        );
        self.evaluate_script(&script)
    }

    fn find(&self, selector: &str) -> Result<Element<'_>> {
        self.tab
            .find_element(selector)
            .map_err(|_| AmoError::ElementNotFound(selector.to_string()))
    }

    /// Fail if the current document was served with an error status
    fn check_response_status(&self, url: &str) -> Result<()> {
        let status = self
            .evaluate_script(
                "(() => { const nav = performance.getEntriesByType('navigation')[0]; \
                 return nav && nav.responseStatus ? nav.responseStatus : 0; })()",
            )?
            .as_u64()
            .unwrap_or(0);

        if status >= 400 {
            return Err(AmoError::Navigation(format!(
                "{} responded with HTTP {}",
                url, status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Page for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);

        self.tab
            .navigate_to(url)
            .map_err(|e| AmoError::Navigation(format!("Failed to navigate to {}: {}", url, e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| AmoError::Navigation(format!("Navigation timeout for {}: {}", url, e)))?;

        self.check_response_status(url)?;
        debug!("Navigated to {}", self.tab.get_url());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        debug!("Waiting for element: {} (timeout: {:?})", selector, timeout);

        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map_err(|_| AmoError::timeout(format!("element {}", selector), timeout))?;

        debug!("Element found: {}", selector);
        Ok(())
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        Ok(self.query(selector, "true")?.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        debug!("Clicking {}", selector);
        self.find(selector)?
            .click()
            .map_err(|e| AmoError::Browser(format!("Failed to click {}: {}", selector, e)))?;
        Ok(())
    }

    async fn click_and_wait_for_navigation(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<()> {
        // Arm first: the marker disappears with the current document
        self.evaluate_script(&format!("window.{} = true", NAVIGATION_MARKER))?;
        self.click(selector).await?;

        let check = format!(
            "window.{} === undefined && document.readyState === 'complete'",
            NAVIGATION_MARKER
        );
        let start = Instant::now();
        loop {
            // Evaluation fails while the old document is torn down
            if let Ok(Value::Bool(true)) = self.evaluate_script(&check) {
                break;
            }
            if start.elapsed() >= timeout {
                return Err(AmoError::timeout(
                    format!("navigation after clicking {}", selector),
                    timeout,
                ));
            }
            sleep(NAVIGATION_POLL_INTERVAL).await;
        }

        let url = self.tab.get_url();
        self.check_response_status(&url)?;
        debug!("Navigated to {}", url);
        Ok(())
    }

    async fn set_value(&self, selector: &str, value: &str) -> Result<()> {
        self.find(selector)?
            .call_js_fn(
                "function(value) { \
                     this.value = value; \
                     this.dispatchEvent(new Event('input', { bubbles: true })); \
                 }",
                vec![json!(value)],
                false,
            )
            .map_err(|e| AmoError::Browser(format!("Failed to fill {}: {}", selector, e)))?;
        Ok(())
    }

    async fn upload_file(&self, selector: &str, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        self.find(selector)?
            .set_input_files(&[path.as_ref()])
            .map_err(|e| {
                AmoError::Browser(format!("Failed to select {} in {}: {}", path, selector, e))
            })?;
        Ok(())
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>> {
        Ok(self
            .query(selector, "el.textContent")?
            .as_str()
            .map(str::to_string))
    }

    async fn inner_html(&self, selector: &str) -> Result<Option<String>> {
        Ok(self
            .query(selector, "el.innerHTML")?
            .as_str()
            .map(str::to_string))
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let expression = format!("el.getAttribute({})", json!(name));
        Ok(self
            .query(selector, &expression)?
            .as_str()
            .map(str::to_string))
    }

    async fn reload(&self) -> Result<()> {
        debug!("Reloading {}", self.tab.get_url());
        self.tab
            .reload(false, None)
            .map_err(|e| AmoError::Navigation(format!("Failed to reload: {}", e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| AmoError::Navigation(format!("Reload timeout: {}", e)))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Closing browser session");
        if let Err(e) = self.tab.close(false) {
            warn!("Failed to close tab: {}", e);
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        debug!("BrowserSession dropped, browser will be cleaned up");
    }
}
