//! Command-line interface definitions for tia_scrape.
//!
//! Every option can also come from the environment. Options given here
//! override the values read from the YAML config file.

use crate::config::{ConfigError, RunConfig};
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for a scraping run.
///
/// # Examples
///
/// ```sh
/// # Defaults: 50 AI articles into ./output
/// tia_scrape
///
/// # Different category, fewer articles, visible browser
/// tia_scrape --category startups -n 10 --headful
///
/// # Settings from a file, output dir overridden
/// tia_scrape -c config.yaml -o /tmp/articles
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a config.yaml file
    #[arg(short, long, env = "TIA_SCRAPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Category slug to crawl, e.g. `artificial-intelligence`
    #[arg(long, env = "TIA_SCRAPE_CATEGORY")]
    pub category: Option<String>,

    /// Number of unique articles to collect
    #[arg(short, long)]
    pub num_articles: Option<usize>,

    /// Maximum scroll iterations on the listing page
    #[arg(short, long)]
    pub max_scrolls: Option<u32>,

    /// Directory for the JSON batch files
    #[arg(short, long, env = "TIA_SCRAPE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headful: bool,
}

impl Cli {
    /// Load the config file (or defaults), apply overrides and validate.
    pub fn resolve_config(&self) -> Result<RunConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };

        if let Some(category) = &self.category {
            config.category = category.clone();
        }
        if let Some(n) = self.num_articles {
            config.num_articles = n;
        }
        if let Some(n) = self.max_scrolls {
            config.max_scrolls = n;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.headful {
            config.headless = false;
        }

        config.validated()
    }
}
