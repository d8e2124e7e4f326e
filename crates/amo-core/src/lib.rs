//! # amo-core
//!
//! Core types for publishing browser extensions to addons.mozilla.org (AMO).
//!
//! A release goes through three steps driven by a release pipeline:
//!
//! - **verify**: the account secrets are present ([`verify_conditions`])
//! - **prepare**: the packager's archives exist ([`ReleasePipeline::prepare`])
//! - **publish**: a browser session walks the marketplace's submission flow
//!   (see the `amo-browser` crate)
//!
//! This crate has no browser dependency. It holds the error taxonomy, the
//! configuration file format, the submission input bundle and the bounded
//! retry used by the upload stage.

mod error;
mod types;

pub mod config;
pub mod pipeline;
pub mod retry;

pub use config::{BrowserSettings, ReleaseConfig, Timeouts, DEFAULT_BASE_URL};
pub use error::{AmoError, Result};
pub use pipeline::{verify_conditions, ReleasePhase, ReleasePipeline};
pub use retry::{retry_with_hook, RetryPolicy};
pub use types::*;
