//! amo-release - publish browser extension versions to addons.mozilla.org
//!
//! Usage:
//!   amo-release init                          Write a default .amo/config.toml
//!   amo-release verify                        Check the account secrets
//!   amo-release publish <slug> --xpi <file>   Submit a new version

use amo_browser::publish;
use amo_core::{Artifacts, ReleaseConfig, ReleasePipeline};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "amo-release")]
#[command(author, version, about = "Publish browser extensions to addons.mozilla.org")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding .amo/config.toml; archive paths are resolved against it
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Check that FIREFOX_EMAIL, FIREFOX_PASSWORD and FIREFOX_TOTP_SECRET are set
    Verify,

    /// Submit a new version of an add-on
    Publish {
        /// Add-on slug, as in https://addons.mozilla.org/en-US/firefox/addon/SLUG/
        slug: String,

        /// Installable archive
        #[arg(long, value_name = "FILE")]
        xpi: PathBuf,

        /// Source archive for reviewers
        #[arg(long, value_name = "FILE")]
        sources: Option<PathBuf>,

        /// Release notes text
        #[arg(long, conflicts_with = "notes_file")]
        notes: Option<String>,

        /// Read release notes from a file
        #[arg(long, value_name = "FILE")]
        notes_file: Option<PathBuf>,

        /// Notes to the reviewer
        #[arg(long)]
        reviewer_notes: Option<String>,

        /// Marketplace base URL (overrides the config file)
        #[arg(long)]
        base_url: Option<String>,

        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init => cmd_init(cli.dir),
        Commands::Verify => cmd_verify(),
        Commands::Publish {
            slug,
            xpi,
            sources,
            notes,
            notes_file,
            reviewer_notes,
            base_url,
            headed,
        } => {
            let notes = match (notes, notes_file) {
                (Some(notes), _) => notes,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read release notes from {:?}", path))?,
                (None, None) => anyhow::bail!("Release notes are required (--notes or --notes-file)"),
            };
            let options = PublishOptions {
                slug,
                artifacts: Artifacts {
                    xpi_path: xpi,
                    sources_path: sources,
                },
                notes,
                reviewer_notes,
                base_url,
                headed,
            };
            cmd_publish(cli.dir, options).await
        }
    }
}

struct PublishOptions {
    slug: String,
    artifacts: Artifacts,
    notes: String,
    reviewer_notes: Option<String>,
    base_url: Option<String>,
    headed: bool,
}

fn environment() -> HashMap<String, String> {
    std::env::vars().collect()
}

fn cmd_init(dir: PathBuf) -> Result<()> {
    ReleaseConfig::write_default(&dir).context("Failed to write configuration")?;
    println!("Created {:?}", dir.join(".amo/config.toml"));
    Ok(())
}

fn cmd_verify() -> Result<()> {
    let mut pipeline = ReleasePipeline::new();
    pipeline.verify(&environment())?;
    println!("Release conditions verified");
    Ok(())
}

async fn cmd_publish(dir: PathBuf, options: PublishOptions) -> Result<()> {
    let mut config = ReleaseConfig::load_or_default(&dir).context("Failed to load configuration")?;
    if let Some(base_url) = options.base_url {
        config.base_url = base_url;
    }
    if options.headed {
        config.browser.headless = false;
    }

    let mut pipeline = ReleasePipeline::new();
    pipeline.verify(&environment())?;
    pipeline.prepare(options.artifacts, &dir)?;

    let ctx = pipeline.submission(
        &options.slug,
        &options.notes,
        options.reviewer_notes.as_deref(),
        config.base_url(),
    )?;
    info!("Publishing {} to {}", ctx.addon_slug, ctx.base_url);

    let release = publish(&ctx, &config).await?;
    pipeline.mark_published()?;

    println!("{}", serde_json::to_string_pretty(&release)?);
    Ok(())
}
