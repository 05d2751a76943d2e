//! # tia_scrape
//!
//! Harvests article listings and full article bodies from Tech in Asia's
//! client-rendered news pages using a real (headless) Chromium session,
//! and writes deduplicated, structured records as JSON batches.
//!
//! ## Features
//!
//! - Scroll-driven crawl of a category listing with per-article dedup
//! - Multi-strategy field extraction that tolerates markup churn
//! - Full-text enrichment with an in-page script fallback for teaser pages
//! - Retrying navigation with exponential backoff and page recovery
//! - Randomized pacing, user agent and window size
//!
//! ## Usage
//!
//! ```sh
//! tia_scrape --category artificial-intelligence -n 20 -o ./output
//! ```
//!
//! ## Architecture
//!
//! 1. **Session**: launch Chromium with a randomized identity
//! 2. **Listing**: scroll the category page and parse article cards
//! 3. **Content**: visit each article and extract its body text
//! 4. **Output**: write records to JSON in fixed-size batches

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod behavior;
mod browser;
mod cli;
mod config;
mod dedup;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;

use behavior::ThreadRngPolicy;
use browser::chrome::ChromeLauncher;
use cli::Cli;
use outputs::json::JsonStore;
use pipeline::Pipeline;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("tia_scrape starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        category = %config.category,
        num_articles = config.num_articles,
        max_scrolls = config.max_scrolls,
        output_dir = %config.output_dir.display(),
        "Loaded configuration"
    );

    // Early check: ensure output dir is writable
    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let store = JsonStore::new(&config.output_dir, &config.filename_prefix, &config.category);
    let mut pipeline = Pipeline::new(config, ChromeLauncher, store, Arc::new(ThreadRngPolicy))?;
    let report = pipeline.run().await?;
    debug!(history = ?pipeline.history(), "Pipeline states");

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        articles = report.records.len(),
        enriched = report.stats.enriched,
        batches = report.saved.len(),
        state = ?report.state,
        "tia_scrape finished"
    );

    Ok(())
}
