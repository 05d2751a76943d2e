//! Data models for scraped articles and run statistics.
//!
//! This module defines the value types that flow through the pipeline:
//! - [`ArticleRecord`]: one article card as parsed from the listing page,
//!   optionally enriched with its full body text
//! - [`RunStats`]: counters aggregated over a single pipeline run
//!
//! Records are never mutated in place once built. Enrichment goes through
//! [`ArticleRecord::with_content`], which returns a new record.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder stored in `relative_time` when the card carries no time hint.
pub const NOT_AVAILABLE: &str = "N/A";

/// Format used for `scraped_at`.
pub const SCRAPED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single article as discovered on the category listing page.
///
/// Every field except `article_id` and `article_url` is best-effort: the
/// listing markup changes often and missing fields do not invalidate the
/// record. `content` is only filled in by the enrichment phase; `None`
/// there means extraction failed, not that the article is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Slug taken from the article URL (or the link's domain for bare links).
    pub article_id: Option<String>,
    /// Headline text.
    pub title: Option<String>,
    /// Absolute article URL.
    pub article_url: Option<String>,
    /// Name of the original publisher, when the card credits one.
    pub source: Option<String>,
    /// Link to the original publisher.
    pub source_url: Option<String>,
    /// Thumbnail image URL.
    pub image_url: Option<String>,
    /// Human-readable publication time, e.g. `"09:30 AM at May 06, 2025"`.
    pub posted_time: Option<String>,
    /// RFC 3339 rendering of the same instant as `posted_time`.
    pub posted_time_iso: Option<String>,
    /// Raw recency label such as `"2 hours ago"`, or [`NOT_AVAILABLE`].
    pub relative_time: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    /// Full article body, populated during enrichment.
    pub content: Option<String>,
    /// Local timestamp of when the record was built.
    pub scraped_at: String,
}

impl ArticleRecord {
    /// Create an empty record stamped with the given `scraped_at` value.
    pub fn new(scraped_at: impl Into<String>) -> Self {
        Self {
            article_id: None,
            title: None,
            article_url: None,
            source: None,
            source_url: None,
            image_url: None,
            posted_time: None,
            posted_time_iso: None,
            relative_time: NOT_AVAILABLE.to_string(),
            categories: Vec::new(),
            tags: Vec::new(),
            content: None,
            scraped_at: scraped_at.into(),
        }
    }

    /// Current local time in [`SCRAPED_AT_FORMAT`].
    pub fn now_stamp() -> String {
        Local::now().format(SCRAPED_AT_FORMAT).to_string()
    }

    /// A record is only worth keeping when it points somewhere.
    pub fn is_valid(&self) -> bool {
        self.article_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Return a copy of this record carrying `content`.
    ///
    /// Every other field is carried over unchanged.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..self.clone()
        }
    }

    /// Short label for log lines: the id, else the title, else `"<unknown>"`.
    pub fn label(&self) -> &str {
        self.article_id
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or("<unknown>")
    }
}

/// Statistics for one pipeline run.
///
/// `found` counts every valid card the listing phase parsed, duplicates
/// included; `valid` counts the unique ones that were kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub found: usize,
    pub valid: usize,
    pub duplicates: usize,
    pub incomplete: usize,
    pub enriched: usize,
    pub duration: Duration,
}

impl RunStats {
    /// Unique articles per second over the whole run.
    pub fn articles_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.valid as f64 / secs
        } else {
            0.0
        }
    }
}
