//! In-memory marketplace for testing the workflow stages
//!
//! Mirrors the page sequence of the real site closely enough for the stages
//! to walk it: authorization gate, OAuth sign-in (email, password, 2FA),
//! the upload page with an asynchronous validation job, then the source,
//! details and finish steps. Every finished step is recorded the way the
//! server would see it.

use crate::page::Page;
use crate::selectors::*;
use crate::totp;
use amo_core::{AmoError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::{sleep, Instant};

pub const BASE_URL: &str = "http://amo.test";
pub const EMAIL: &str = "test@test.com";
pub const PASSWORD: &str = "test123";
pub const TOTP_SECRET: &str = "BMOEOJQ4LYUB4Q27";
pub const TOTP_ERROR_ID: &str = "totp-code-error";
pub const TOTP_ERROR_MESSAGE: &str = "Invalid two-step authentication code";

/// What the validation job does on one upload attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadScript {
    /// Progress text, then `status-pass` after the delay
    Pass(Duration),
    /// No progress text at all, then `status-fail` after the delay
    Fail(Duration),
    /// Nothing ever appears
    Stall,
    /// Progress text forever, never a terminal state
    Crawl,
}

/// Server-side record of one version submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionVersionUpload {
    pub slug: String,
    pub version_id: u64,
    pub has_sources: Option<bool>,
    pub sources_file_name: Option<String>,
    pub release_notes: Option<String>,
    pub notes_to_reviewer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Blank,
    Authorization { hops_left: usize },
    SigninEmail,
    SigninPassword,
    TotpChallenge { invalid: bool },
    TotpSetup,
    Submit,
    Source,
    Details,
    Finish,
    ErrorPage,
}

struct UploadJob {
    script: UploadScript,
    started: Instant,
}

struct State {
    url: String,
    screen: Screen,
    signed_in: bool,
    fields: HashMap<String, String>,
    files: HashMap<String, PathBuf>,
    job: Option<UploadJob>,
    upload_attempts: usize,
    reloads: usize,
    closes: usize,
    uploads: Vec<ExtensionVersionUpload>,
    file_uploads: Vec<(String, PathBuf)>,
    slug: String,
}

/// Scripted fake of the marketplace, implementing [`Page`]
pub struct FakeMarketplace {
    state: Mutex<State>,
    gate_hops: usize,
    require_totp_setup: bool,
    reject_totp: bool,
    ignore_totp: bool,
    scripts: Vec<UploadScript>,
    source_errors: Option<String>,
    finish_html: String,
}

impl Default for FakeMarketplace {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMarketplace {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                url: "about:blank".to_string(),
                screen: Screen::Blank,
                signed_in: false,
                fields: HashMap::new(),
                files: HashMap::new(),
                job: None,
                upload_attempts: 0,
                reloads: 0,
                closes: 0,
                uploads: Vec::new(),
                file_uploads: Vec::new(),
                slug: String::new(),
            }),
            gate_hops: 0,
            require_totp_setup: false,
            reject_totp: false,
            ignore_totp: false,
            scripts: vec![UploadScript::Pass(Duration::from_secs(3))],
            source_errors: None,
            finish_html: "<h2>Version Submitted</h2><p>Your add-on is waiting for review.</p>"
                .to_string(),
        }
    }

    /// Start with a valid session cookie
    pub fn signed_in(self) -> Self {
        self.state.lock().unwrap().signed_in = true;
        self
    }

    /// Pass through `/authorization` for this many location reads first
    pub fn with_authorization_gate(mut self, hops: usize) -> Self {
        self.gate_hops = hops;
        self
    }

    pub fn requiring_totp_setup(mut self) -> Self {
        self.require_totp_setup = true;
        self
    }

    pub fn rejecting_totp(mut self) -> Self {
        self.reject_totp = true;
        self
    }

    /// Accept the code submission but never redirect or mark the input
    pub fn ignoring_totp(mut self) -> Self {
        self.ignore_totp = true;
        self
    }

    /// Validation behavior per attempt; the last entry repeats
    pub fn with_uploads(mut self, scripts: Vec<UploadScript>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_source_errors(mut self, html: &str) -> Self {
        self.source_errors = Some(html.to_string());
        self
    }

    pub fn with_finish_html(mut self, html: &str) -> Self {
        self.finish_html = html.to_string();
        self
    }

    pub fn uploads(&self) -> Vec<ExtensionVersionUpload> {
        self.state.lock().unwrap().uploads.clone()
    }

    /// Every `upload_file` call as (selector, path)
    pub fn file_uploads(&self) -> Vec<(String, PathBuf)> {
        self.state.lock().unwrap().file_uploads.clone()
    }

    pub fn upload_attempts(&self) -> usize {
        self.state.lock().unwrap().upload_attempts
    }

    pub fn reloads(&self) -> usize {
        self.state.lock().unwrap().reloads
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn submit_url() -> String {
        MarketplaceUrls::new(BASE_URL, "testextension").submit()
    }

    fn step_url(state: &State, id: u64, step: &str) -> String {
        format!(
            "{}/en-US/developers/addon/{}/versions/submit/{}/{}",
            BASE_URL, state.slug, id, step
        )
    }

    fn go(state: &mut State, screen: Screen, url: String) {
        state.screen = screen;
        state.url = url;
        state.fields.clear();
        state.files.clear();
        state.job = None;
    }

    fn job_status(job: &UploadJob) -> (Option<String>, &'static str) {
        let elapsed = job.started.elapsed();
        match job.script {
            UploadScript::Pass(after) if elapsed >= after => {
                (Some("Finished validating test.xpi".to_string()), "status-pass")
            }
            UploadScript::Pass(_) | UploadScript::Crawl => {
                (Some("Uploading test.xpi\n  42%  Cancel".to_string()), "")
            }
            UploadScript::Fail(after) if elapsed >= after => (None, "status-fail"),
            UploadScript::Fail(_) | UploadScript::Stall => (None, ""),
        }
    }

    fn validation_status(state: &State) -> &'static str {
        state.job.as_ref().map(|j| Self::job_status(j).1).unwrap_or("")
    }

    fn element_exists(&self, state: &State, selector: &str) -> bool {
        match state.screen {
            Screen::SigninEmail => [EMAIL_INPUT, SIGNIN_SUBMIT].contains(&selector),
            Screen::SigninPassword => [PASSWORD_INPUT, SIGNIN_SUBMIT].contains(&selector),
            Screen::TotpChallenge { invalid } => {
                [TOTP_INPUT, TOTP_SUBMIT].contains(&selector)
                    || (invalid
                        && (selector == TOTP_INPUT_INVALID
                            || selector == format!("#{}", TOTP_ERROR_ID)))
            }
            Screen::Submit => {
                [ADDON_FILE_INPUT, UPLOAD_STATUS_RESULTS].contains(&selector)
                    || (selector == UPLOAD_PROGRESS && state.job.is_some())
                    || (selector == UPLOAD_FINISH && Self::validation_status(state) == "status-pass")
            }
            Screen::Source => {
                [HAS_SOURCE_INPUT, HAS_SOURCE_YES, HAS_SOURCE_NO, SOURCE_SUBMIT]
                    .contains(&selector)
                    || (selector == SOURCE_FILE_INPUT
                        && state.fields.get(HAS_SOURCE_INPUT).map(String::as_str) == Some("yes"))
                    || (selector == FORM_ERROR_LIST && self.source_errors.is_some())
            }
            Screen::Details => {
                [RELEASE_NOTES_INPUT, REVIEWER_NOTES_INPUT, DETAILS_SUBMIT].contains(&selector)
            }
            Screen::Finish => selector == SUBMISSION_RESULT,
            _ => false,
        }
    }

    fn require(&self, state: &State, selector: &str) -> Result<()> {
        if self.element_exists(state, selector) {
            Ok(())
        } else {
            Err(AmoError::ElementNotFound(selector.to_string()))
        }
    }

    fn totp_accepted(&self, code: &str) -> bool {
        if self.reject_totp {
            return false;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        [now, now.saturating_sub(30)]
            .iter()
            .any(|t| totp::code_at(TOTP_SECRET, *t).ok().as_deref() == Some(code))
    }

    /// Apply a click; returns whether it started a navigation
    fn apply_click(&self, state: &mut State, selector: &str) -> Result<bool> {
        self.require(state, selector)?;

        match (state.screen, selector) {
            (Screen::SigninEmail, SIGNIN_SUBMIT) => {
                if state.fields.get(EMAIL_INPUT).map(String::as_str) == Some(EMAIL) {
                    // Same document, the form swaps to the password step
                    state.screen = Screen::SigninPassword;
                    state.fields.clear();
                } else {
                    let url = state.url.clone();
                    Self::go(state, Screen::ErrorPage, url);
                }
                Ok(false)
            }
            (Screen::SigninPassword, SIGNIN_SUBMIT) => {
                if state.fields.get(PASSWORD_INPUT).map(String::as_str) != Some(PASSWORD) {
                    let url = state.url.clone();
                    Self::go(state, Screen::ErrorPage, url);
                } else if self.require_totp_setup {
                    Self::go(state, Screen::TotpSetup, format!("{}{}", BASE_URL, TOTP_SETUP_PATH));
                } else {
                    let url = state.url.clone();
                    Self::go(state, Screen::TotpChallenge { invalid: false }, url);
                }
                Ok(true)
            }
            (Screen::TotpChallenge { .. }, TOTP_SUBMIT) => {
                let code = state.fields.get(TOTP_INPUT).cloned().unwrap_or_default();
                if self.ignore_totp {
                    return Ok(false);
                }
                if self.totp_accepted(&code) {
                    state.signed_in = true;
                    let url = MarketplaceUrls::new(BASE_URL, &state.slug).submit();
                    Self::go(state, Screen::Submit, url);
                } else {
                    state.screen = Screen::TotpChallenge { invalid: true };
                }
                Ok(true)
            }
            (Screen::Source, HAS_SOURCE_YES) => {
                state.fields.insert(HAS_SOURCE_INPUT.to_string(), "yes".to_string());
                Ok(false)
            }
            (Screen::Source, HAS_SOURCE_NO) => {
                state.fields.insert(HAS_SOURCE_INPUT.to_string(), "no".to_string());
                Ok(false)
            }
            (Screen::Submit, UPLOAD_FINISH) => {
                let version_id = state.uploads.len() as u64;
                state.uploads.push(ExtensionVersionUpload {
                    slug: state.slug.clone(),
                    version_id,
                    ..Default::default()
                });
                let url = Self::step_url(state, version_id, "source");
                Self::go(state, Screen::Source, url);
                Ok(true)
            }
            (Screen::Source, SOURCE_SUBMIT) => {
                if self.source_errors.is_some() {
                    // Re-rendered with the error list
                    return Ok(true);
                }
                let has_source = state.fields.get(HAS_SOURCE_INPUT).cloned();
                let source_file = state.files.get(SOURCE_FILE_INPUT).cloned();
                let Some(upload) = state.uploads.last_mut() else {
                    return Err(AmoError::Other("no version upload in progress".to_string()));
                };
                match has_source.as_deref() {
                    Some("yes") => {
                        let Some(file) = source_file else {
                            return Err(AmoError::Other("No sources zip provided".to_string()));
                        };
                        upload.sources_file_name = file
                            .file_name()
                            .map(|n| n.to_string_lossy().to_string());
                        upload.has_sources = Some(true);
                    }
                    Some(_) => upload.has_sources = Some(false),
                    None => return Err(AmoError::Other("No option chosen".to_string())),
                }
                let id = upload.version_id;
                let url = Self::step_url(state, id, "details");
                Self::go(state, Screen::Details, url);
                Ok(true)
            }
            (Screen::Details, DETAILS_SUBMIT) => {
                let notes = state.fields.get(RELEASE_NOTES_INPUT).cloned();
                let reviewer = state.fields.get(REVIEWER_NOTES_INPUT).cloned();
                let Some(upload) = state.uploads.last_mut() else {
                    return Err(AmoError::Other("no version upload in progress".to_string()));
                };
                upload.release_notes = notes;
                upload.notes_to_reviewer = reviewer;
                let id = upload.version_id;
                let url = Self::step_url(state, id, "finish");
                Self::go(state, Screen::Finish, url);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl Page for FakeMarketplace {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let prefix = format!("{}/en-US/developers/addon/", BASE_URL);
        let Some(slug) = url
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix("/versions/submit/"))
        else {
            return Err(AmoError::Navigation(format!("{} responded with HTTP 404", url)));
        };
        state.slug = slug.to_string();

        if state.signed_in {
            Self::go(&mut state, Screen::Submit, url.to_string());
        } else if self.gate_hops > 0 {
            let gate = format!("{}{}", BASE_URL, AUTHORIZATION_PATH);
            Self::go(&mut state, Screen::Authorization { hops_left: self.gate_hops }, gate);
        } else {
            let signin = format!("{}/oauth/signin?redirectTo=%2F", BASE_URL);
            Self::go(&mut state, Screen::SigninEmail, signin);
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if let Screen::Authorization { hops_left } = state.screen {
            if hops_left <= 1 {
                let signin = format!("{}/oauth/signin?redirectTo=%2F", BASE_URL);
                Self::go(&mut state, Screen::SigninEmail, signin);
            } else {
                state.screen = Screen::Authorization {
                    hops_left: hops_left - 1,
                };
            }
            return Ok(format!("{}{}", BASE_URL, AUTHORIZATION_PATH));
        }
        Ok(state.url.clone())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        if self.exists(selector).await? {
            return Ok(());
        }
        sleep(timeout).await;
        Err(AmoError::timeout(format!("element {}", selector), timeout))
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(self.element_exists(&state, selector))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.apply_click(&mut state, selector)?;
        Ok(())
    }

    async fn click_and_wait_for_navigation(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<()> {
        let navigated = {
            let mut state = self.state.lock().unwrap();
            self.apply_click(&mut state, selector)?
        };
        if navigated {
            return Ok(());
        }
        sleep(timeout).await;
        Err(AmoError::timeout(
            format!("navigation after clicking {}", selector),
            timeout,
        ))
    }

    async fn set_value(&self, selector: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.require(&state, selector)?;
        state.fields.insert(selector.to_string(), value.to_string());
        Ok(())
    }

    async fn upload_file(&self, selector: &str, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.require(&state, selector)?;
        state
            .file_uploads
            .push((selector.to_string(), path.to_path_buf()));
        state.files.insert(selector.to_string(), path.to_path_buf());

        if selector == ADDON_FILE_INPUT {
            let script = self
                .scripts
                .get(state.upload_attempts)
                .or_else(|| self.scripts.last())
                .copied()
                .unwrap_or(UploadScript::Stall);
            state.upload_attempts += 1;
            state.job = Some(UploadJob {
                script,
                started: Instant::now(),
            });
        }
        Ok(())
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        if !self.element_exists(&state, selector) {
            return Ok(None);
        }
        Ok(match selector {
            UPLOAD_PROGRESS => state
                .job
                .as_ref()
                .map(|j| Self::job_status(j).0.unwrap_or_default()),
            s if s == format!("#{}", TOTP_ERROR_ID) => Some(format!("\n  {}\n", TOTP_ERROR_MESSAGE)),
            _ => Some(String::new()),
        })
    }

    async fn inner_html(&self, selector: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        if !self.element_exists(&state, selector) {
            return Ok(None);
        }
        Ok(match selector {
            UPLOAD_STATUS_RESULTS => Some(match Self::validation_status(&state) {
                "status-pass" => "<strong>Your add-on passed validation</strong> with no errors and <b>1</b> warning.".to_string(),
                "status-fail" => "<strong>Your add-on failed validation</strong> with <b>2</b> errors.".to_string(),
                _ => String::new(),
            }),
            FORM_ERROR_LIST => self.source_errors.clone(),
            SUBMISSION_RESULT => Some(self.finish_html.clone()),
            _ => Some(String::new()),
        })
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        if !self.element_exists(&state, selector) {
            return Ok(None);
        }
        Ok(match (selector, name) {
            (UPLOAD_STATUS_RESULTS, "class") => Some(Self::validation_status(&state).to_string()),
            (TOTP_INPUT, "aria-describedby") if matches!(state.screen, Screen::TotpChallenge { invalid: true }) => {
                Some(TOTP_ERROR_ID.to_string())
            }
            _ => None,
        })
    }

    async fn reload(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.reloads += 1;
        let (screen, url) = (state.screen, state.url.clone());
        Self::go(&mut state, screen, url);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}
