//! Browser abstraction used by the scraping pipeline.
//!
//! The pipeline never talks to Chromium directly. It drives a
//! [`BrowserPage`], which is produced by a [`SessionFactory`]:
//!
//! - [`chrome`]: the real implementation on top of `chromiumoxide`
//! - [`navigation`]: retrying navigation with exponential backoff
//!
//! Keeping the page behind a trait lets the listing crawler, the body
//! extractor and the orchestrator be exercised against scripted pages in
//! tests.

use crate::config::Viewport;
use std::time::Duration;
use thiserror::Error;

pub mod chrome;
pub mod navigation;

#[cfg(test)]
pub(crate) mod testing;

/// Failures reported by a [`BrowserPage`].
#[derive(Debug, Error)]
pub enum PageError {
    #[error("operation timed out")]
    Timeout,
    /// The page or its target went away; the handle must be recreated.
    #[error("page connection closed: {0}")]
    Closed(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("selector not found: {0}")]
    SelectorNotFound(String),
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("browser launch failed: {0}")]
    Launch(String),
}

impl PageError {
    /// Classify a raw driver message. Messages announcing that the
    /// connection or target was closed map to [`PageError::Closed`].
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("connection closed")
            || lower.contains("target closed")
            || lower.contains("channel closed")
        {
            PageError::Closed(message)
        } else {
            PageError::Transport(message)
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PageError::Timeout)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PageError::Closed(_))
    }
}

/// Browser identity chosen once per session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: Option<String>,
    pub viewport: Option<Viewport>,
    pub headless: bool,
}

/// A single browser tab driven sequentially by the pipeline.
pub trait BrowserPage {
    /// Navigate to `url`, failing with [`PageError::Timeout`] after `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), PageError>;

    /// Serialized markup of the current document.
    async fn content(&self) -> Result<String, PageError>;

    /// Evaluate a JavaScript expression and return its JSON value
    /// (`Null` for `undefined`).
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, PageError>;

    /// Wait until `selector` matches an element or `timeout` elapses.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), PageError>;

    /// Move the mouse pointer to viewport coordinates.
    async fn move_mouse(&self, x: f64, y: f64) -> Result<(), PageError>;

    /// Replace a dead tab with a fresh one in the same browser.
    async fn recreate(&mut self) -> Result<(), PageError>;

    /// Release the tab and the browser behind it.
    async fn close(self) -> Result<(), PageError>;
}

/// Opens browser sessions.
pub trait SessionFactory {
    type Page: BrowserPage;

    async fn open(&self, identity: &Identity) -> Result<Self::Page, PageError>;
}
