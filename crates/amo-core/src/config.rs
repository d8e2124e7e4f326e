//! Configuration management for amo-release
//!
//! Settings that are not secrets live in `.amo/config.toml` in the working
//! directory. Every field has a default, so the file is optional and may be
//! partial.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{AmoError, Result};

/// Production marketplace host
pub const DEFAULT_BASE_URL: &str = "https://addons.mozilla.org";

/// Repository-level release configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// Marketplace base URL (overridable for testing against a mock)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Maximum upload attempts, including the first one
    #[serde(default = "default_upload_attempts")]
    pub upload_attempts: usize,

    /// Browser launch settings
    #[serde(default)]
    pub browser: BrowserSettings,

    /// Per-stage waits
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Browser launch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Run in headless mode
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Force the Chrome sandbox on or off. Unset means: disabled when
    /// running as root or on CI.
    #[serde(default)]
    pub sandbox: Option<bool>,

    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Timeouts for each bounded wait in the publish workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_navigation_secs")]
    pub navigation_secs: u64,

    /// How long to wait for the redirect back to the submit page after
    /// entering the 2FA code
    #[serde(default = "default_two_factor_secs")]
    pub two_factor_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause before and after locating the upload input
    #[serde(default = "default_upload_settle_ms")]
    pub upload_settle_ms: u64,

    /// Upload attempt is abandoned after this long without progress
    #[serde(default = "default_stall_secs")]
    pub stall_secs: u64,

    /// Hard ceiling across all upload attempts
    #[serde(default = "default_upload_total_secs")]
    pub upload_total_secs: u64,

    /// Source uploads can be large
    #[serde(default = "default_source_submit_secs")]
    pub source_submit_secs: u64,
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_secs)
    }

    pub fn two_factor(&self) -> Duration {
        Duration::from_secs(self.two_factor_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn upload_settle(&self) -> Duration {
        Duration::from_millis(self.upload_settle_ms)
    }

    pub fn stall(&self) -> Duration {
        Duration::from_secs(self.stall_secs)
    }

    pub fn upload_total(&self) -> Duration {
        Duration::from_secs(self.upload_total_secs)
    }

    pub fn source_submit(&self) -> Duration {
        Duration::from_secs(self.source_submit_secs)
    }
}

// Default value providers
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_upload_attempts() -> usize {
    3
}

fn default_navigation_secs() -> u64 {
    30
}

fn default_two_factor_secs() -> u64 {
    6
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_upload_settle_ms() -> u64 {
    1000
}

fn default_stall_secs() -> u64 {
    60
}

fn default_upload_total_secs() -> u64 {
    10 * 60
}

fn default_source_submit_secs() -> u64 {
    10 * 60
}

impl ReleaseConfig {
    /// Load configuration from `.amo/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(".amo/config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| AmoError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Write default configuration to `.amo/config.toml`
    pub fn write_default(root: &Path) -> Result<()> {
        let config_dir = root.join(".amo");
        std::fs::create_dir_all(&config_dir)?;

        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| AmoError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(config_dir.join("config.toml"), content)?;
        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            upload_attempts: default_upload_attempts(),
            browser: BrowserSettings::default(),
            timeouts: Timeouts::default(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            sandbox: None,
            user_agent: None,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_secs: default_navigation_secs(),
            two_factor_secs: default_two_factor_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            upload_settle_ms: default_upload_settle_ms(),
            stall_secs: default_stall_secs(),
            upload_total_secs: default_upload_total_secs(),
            source_submit_secs: default_source_submit_secs(),
        }
    }
}
