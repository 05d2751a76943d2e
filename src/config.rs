//! Run configuration.
//!
//! A [`RunConfig`] is read from an optional YAML file (missing keys fall back
//! to [`RunConfig::default`]), patched with command-line overrides and then
//! validated once. Validation happens before any browser session is opened;
//! after that the configuration is shared read-only for the whole run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Errors raised while loading or validating a [`RunConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{field} must be a positive integer")]
    NotPositive { field: &'static str },
    #[error("{field} must satisfy 0 <= lo <= hi (got {lo} .. {hi})")]
    InvalidRange {
        field: &'static str,
        lo: f64,
        hi: f64,
    },
    #[error("{field} must be a non-empty string")]
    Empty { field: &'static str },
    #[error("base_url is not an absolute http(s) URL: {0}")]
    BaseUrl(String),
}

/// Browser window size candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Configuration for a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of unique articles to collect before the listing phase stops.
    pub num_articles: usize,
    /// Ceiling on scroll iterations over the listing page. Zero means the
    /// first page is harvested without scrolling.
    pub max_scrolls: u32,
    /// Per-navigation timeout, in seconds.
    pub timeout_secs: u64,
    /// Navigation attempts before giving up on a URL.
    pub retry_count: u32,
    /// Records handed to the store per `save_batch` call.
    pub batch_size: usize,
    /// Listing page, e.g. `https://www.techinasia.com/news`.
    pub base_url: String,
    /// Category slug appended as `?category=<slug>`.
    pub category: String,
    /// Generic content selectors tried after the built-in site selectors.
    pub content_selectors: Vec<String>,
    /// Scroll actions per simulated scroll burst.
    pub scroll_iterations_range: (u32, u32),
    /// Pixels per scroll action.
    pub scroll_distance_range: (u32, u32),
    /// Seconds between scroll actions.
    pub sleep_scroll_range: (f64, f64),
    /// Mouse moves per simulated browse.
    pub mouse_movements_range: (u32, u32),
    /// Seconds between mouse moves.
    pub sleep_mouse_range: (f64, f64),
    /// Seconds spent "reading" after a simulated browse.
    pub reading_delay_range: (f64, f64),
    /// Seconds between listing scrolls and between article requests.
    pub request_delay_range: (f64, f64),
    pub output_dir: PathBuf,
    pub filename_prefix: String,
    pub headless: bool,
    pub randomize_user_agent: bool,
    pub user_agents: Vec<String>,
    pub randomize_viewport: bool,
    pub viewport_sizes: Vec<Viewport>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_articles: 50,
            max_scrolls: 10,
            timeout_secs: 30,
            retry_count: 3,
            batch_size: 100,
            base_url: "https://www.techinasia.com/news".to_string(),
            category: "artificial-intelligence".to_string(),
            content_selectors: vec![
                "article .article-content".to_string(),
                "div[itemprop=\"articleBody\"]".to_string(),
                ".entry-content".to_string(),
                ".story-body".to_string(),
            ],
            scroll_iterations_range: (3, 6),
            scroll_distance_range: (300, 800),
            sleep_scroll_range: (0.5, 1.5),
            mouse_movements_range: (2, 5),
            sleep_mouse_range: (0.1, 0.3),
            reading_delay_range: (0.5, 1.5),
            request_delay_range: (1.0, 3.0),
            output_dir: PathBuf::from("output"),
            filename_prefix: "techinasia_articles".to_string(),
            headless: true,
            randomize_user_agent: true,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36".to_string(),
            ],
            randomize_viewport: true,
            viewport_sizes: vec![
                Viewport { width: 1920, height: 1080 },
                Viewport { width: 1536, height: 864 },
                Viewport { width: 1366, height: 768 },
                Viewport { width: 1280, height: 800 },
            ],
        }
    }
}

impl RunConfig {
    /// Parse a YAML document. Missing keys take their default values.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML config file. The result is not yet validated so
    /// that command-line overrides can be applied first.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Consume the config, returning it only if every field is acceptable.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("num_articles", self.num_articles as u64)?;
        positive("timeout_secs", self.timeout_secs)?;
        positive("retry_count", self.retry_count as u64)?;
        positive("batch_size", self.batch_size as u64)?;

        int_range("scroll_iterations_range", self.scroll_iterations_range)?;
        int_range("scroll_distance_range", self.scroll_distance_range)?;
        int_range("mouse_movements_range", self.mouse_movements_range)?;
        float_range("sleep_scroll_range", self.sleep_scroll_range)?;
        float_range("sleep_mouse_range", self.sleep_mouse_range)?;
        float_range("reading_delay_range", self.reading_delay_range)?;
        float_range("request_delay_range", self.request_delay_range)?;

        if self.category.trim().is_empty() {
            return Err(ConfigError::Empty { field: "category" });
        }
        if self.filename_prefix.trim().is_empty() {
            return Err(ConfigError::Empty { field: "filename_prefix" });
        }
        if self.randomize_user_agent && self.user_agents.is_empty() {
            return Err(ConfigError::Empty { field: "user_agents" });
        }
        if self.randomize_viewport && self.viewport_sizes.is_empty() {
            return Err(ConfigError::Empty { field: "viewport_sizes" });
        }

        match Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
                Ok(())
            }
            _ => Err(ConfigError::BaseUrl(self.base_url.clone())),
        }
    }

    /// Parsed `base_url`.
    pub fn base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|_| ConfigError::BaseUrl(self.base_url.clone()))
    }

    /// Scheme + host of `base_url`, used to resolve relative links.
    pub fn site_origin(&self) -> Result<Url, ConfigError> {
        let mut origin = self.base()?;
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        Ok(origin)
    }

    /// Category listing URL: `base_url?category=<slug>`.
    pub fn listing_url(&self) -> String {
        format!(
            "{}?category={}",
            self.base_url,
            urlencoding::encode(&self.category)
        )
    }

    /// Per-navigation timeout as a [`std::time::Duration`].
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

fn positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::NotPositive { field })
    } else {
        Ok(())
    }
}

fn int_range(field: &'static str, (lo, hi): (u32, u32)) -> Result<(), ConfigError> {
    if lo > hi {
        return Err(ConfigError::InvalidRange {
            field,
            lo: lo as f64,
            hi: hi as f64,
        });
    }
    Ok(())
}

fn float_range(field: &'static str, (lo, hi): (f64, f64)) -> Result<(), ConfigError> {
    if !(lo.is_finite() && hi.is_finite()) || lo < 0.0 || lo > hi {
        return Err(ConfigError::InvalidRange { field, lo, hi });
    }
    Ok(())
}
