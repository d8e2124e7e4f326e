//! Marketplace markup and URL layout
//!
//! Every CSS selector and path the workflow relies on lives here. The
//! marketplace changes its markup from time to time; when it does, this is
//! the file to update.

use amo_core::VersionId;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

// Login chain
pub const AUTHORIZATION_PATH: &str = "/authorization";
pub const TOTP_SETUP_PATH: &str = "/inline_totp_setup";
pub const EMAIL_INPUT: &str = r#"input[type="email"]"#;
pub const PASSWORD_INPUT: &str = r#"input[type="password"]"#;
pub const SIGNIN_SUBMIT: &str = "#submit-btn";
pub const TOTP_INPUT: &str = "input.totp-code";
pub const TOTP_INPUT_INVALID: &str = "input.totp-code.invalid";
pub const TOTP_SUBMIT: &str = r#"[type="submit"]"#;

// Upload page
pub const ADDON_FILE_INPUT: &str = "#upload-addon";
pub const UPLOAD_PROGRESS: &str = "#uploadstatus";
pub const UPLOAD_STATUS_RESULTS: &str = "#upload-status-results";
pub const UPLOAD_FINISH: &str = "#submit-upload-file-finish";

// Source step
pub const HAS_SOURCE_INPUT: &str = r#"#submit-source input[name="has_source"]"#;
pub const HAS_SOURCE_YES: &str = r#"#submit-source input[name="has_source"][value="yes"]"#;
pub const HAS_SOURCE_NO: &str = r#"#submit-source input[name="has_source"][value="no"]"#;
pub const SOURCE_FILE_INPUT: &str = "#id_source";
pub const SOURCE_SUBMIT: &str = r#"#submit-source [type="submit"]:not(.delete-button)"#;
pub const FORM_ERROR_LIST: &str = "#upload-file > .errorlist";

// Details step. The release notes field name carries a locale suffix
// (`release_notes_en-us`); only the first one on the page is filled.
pub const RELEASE_NOTES_INPUT: &str = r#"textarea[name^="release_notes"]"#;
pub const REVIEWER_NOTES_INPUT: &str = r#"textarea[name="approval_notes"]"#;
pub const DETAILS_SUBMIT: &str = r#"#submit-describe button[type="submit"]:not(.delete-button)"#;

// Finish step
pub const SUBMISSION_RESULT: &str = ".addon-submission-process";

pub const RELEASE_NAME: &str = "Firefox Add-on";

/// URLs of one add-on on one marketplace host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketplaceUrls {
    base_url: String,
    slug: String,
}

impl MarketplaceUrls {
    pub fn new(base_url: &str, slug: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            slug: slug.to_string(),
        }
    }

    /// Entry point of the version submission flow
    pub fn submit(&self) -> String {
        format!(
            "{}/en-US/developers/addon/{}/versions/submit/",
            self.base_url, self.slug
        )
    }

    /// Public listing page
    pub fn listing(&self) -> String {
        format!("{}/en-US/firefox/addon/{}/", self.base_url, self.slug)
    }

    /// Developer hub page of one submitted version
    pub fn developer_version(&self, id: VersionId) -> String {
        format!(
            "{}/en-US/developers/addon/{}/versions/{}",
            self.base_url, self.slug, id
        )
    }
}

/// Path component of a URL, or the input itself if it does not parse
pub fn path_of(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// Whether the URL is on the OAuth sign-in page
pub fn is_signin_path(path: &str) -> bool {
    static SIGNIN: OnceLock<Regex> = OnceLock::new();
    SIGNIN
        .get_or_init(|| Regex::new(r"^/oauth(/signin)?/?").expect("valid regex"))
        .is_match(path)
}

/// Version id from a `.../submit/{id}/finish` URL
pub fn finish_version_id(url: &str) -> Option<VersionId> {
    static FINISH: OnceLock<Regex> = OnceLock::new();
    let re = FINISH.get_or_init(|| Regex::new(r"/submit/(\d+)/finish/?$").expect("valid regex"));
    re.captures(&path_of(url))
        .and_then(|caps| caps[1].parse().ok())
        .map(VersionId)
}
