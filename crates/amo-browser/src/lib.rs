//! Publish add-on versions to addons.mozilla.org through a headless browser
//!
//! The marketplace has no upload API usable for listed add-ons with source
//! code, so this crate drives its web submission flow with Chrome DevTools
//! Protocol (CDP).
//!
//! # Example
//!
//! ```no_run
//! use amo_browser::publish;
//! use amo_core::{Artifacts, ReleaseConfig, ReleasePipeline};
//! use std::collections::HashMap;
//! use std::path::{Path, PathBuf};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let env: HashMap<String, String> = std::env::vars().collect();
//!     let config = ReleaseConfig::load_or_default(Path::new("."))?;
//!
//!     let mut pipeline = ReleasePipeline::new();
//!     pipeline.verify(&env)?;
//!     pipeline.prepare(
//!         Artifacts {
//!             xpi_path: PathBuf::from("dist/extension.xpi"),
//!             sources_path: Some(PathBuf::from("dist/sources.zip")),
//!         },
//!         Path::new("."),
//!     )?;
//!
//!     let ctx = pipeline.submission("my-addon", "Bug fixes", None, config.base_url())?;
//!     let info = publish(&ctx, &config).await?;
//!     pipeline.mark_published()?;
//!
//!     println!("{} released at {}", info.name, info.url);
//!     Ok(())
//! }
//! ```
//!
//! # Requirements
//!
//! - Chrome or Chromium installed
//! - An account with two-step authentication enabled
//!
//! # Architecture
//!
//! - [`page`]: the page operations every stage is written against
//! - [`browser`]: the Chrome-backed page
//! - [`auth`]: sign-in, including the one-time code
//! - [`upload`]: .xpi upload and validation polling with retry
//! - [`submission`]: source, details and finish pages
//! - [`report`]: Markdown rendering and the release result
//! - [`workflow`]: the stages in order, with the session closed afterwards

pub mod auth;
pub mod browser;
pub mod page;
pub mod report;
pub mod selectors;
pub mod submission;
pub mod totp;
pub mod upload;
pub mod workflow;

#[cfg(test)]
mod fake;

// Re-export commonly used types
pub use amo_core::{AmoError, Result};
pub use auth::{authenticate, AuthStage};
pub use browser::BrowserSession;
pub use page::Page;
pub use report::html_to_markdown;
pub use selectors::MarketplaceUrls;
pub use submission::submit_version;
pub use upload::{upload_and_validate, UploadPolicy, ValidationReport};
pub use workflow::{publish, publish_with};
