//! Full-text extraction from article pages.
//!
//! # Extraction cascade
//!
//! 1. Navigate to the article (for off-site links, the on-site copy first)
//! 2. Snapshot the markup, simulate a reader, re-snapshot if the page grew
//! 3. Wait briefly for one of the site's content containers
//! 4. Take text from the first site selector that has any, then the
//!    configured selectors, then every `<p>` joined by spaces
//! 5. If the result is shorter than [`MIN_CONTENT_CHARS`], run the same
//!    cascade inside the page and keep whichever text is longer
//!
//! Footer boilerplate is stripped and whitespace collapsed on every path.

use super::element_text;
use crate::behavior::HumanSimulator;
use crate::browser::navigation::NavigationController;
use crate::browser::{BrowserPage, PageError};
use crate::config::RunConfig;
use crate::models::ArticleRecord;
use crate::utils::{non_empty, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Body text shorter than this is treated as a teaser.
pub const MIN_CONTENT_CHARS: usize = 200;

/// Upper bound on the wait for any single content selector.
const MAX_PROBE: Duration = Duration::from_secs(2);

/// Content containers used by Tech in Asia article pages, most specific first.
pub const SITE_SELECTORS: [&str; 11] = [
    "div.jsx-3810287742.jsx-430771670.content",
    "div.content",
    "article.post-content",
    "div.post-content",
    "div.article-content",
    "div.article__content",
    "div.post__content",
    "div#content",
    ".content",
    "article",
    "main",
];

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

static BOILERPLATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Copyright\s*©\s*\d{4}\s*Tech in Asia\.?\s*All Rights Reserved\.?",
        r"A member of\s*The Business Times\s*\.?",
        r"If you're seeing this message, that means\s*JavaScript has been disabled on your browser\s*\.?",
        r"Please enable JavaScript",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const EXTRACT_SCRIPT: &str = r#"(() => {
  const selectors = __SELECTORS__;
  for (const selector of selectors) {
    const element = document.querySelector(selector);
    if (element && element.innerText && element.innerText.trim()) {
      return element.innerText;
    }
  }
  const paragraphs = Array.from(document.querySelectorAll('p'))
    .map(p => p.innerText.trim())
    .filter(t => t.length > 0);
  return paragraphs.length > 0 ? paragraphs.join(' ') : null;
})()"#;

/// Strip footer boilerplate and collapse whitespace. `None` if nothing is left.
pub fn clean_content(raw: &str) -> Option<String> {
    let stripped = BOILERPLATE
        .iter()
        .fold(raw.to_string(), |text, re| re.replace_all(&text, " ").into_owned());
    non_empty(&stripped)
}

/// Body text from a page's markup via site selectors, then `configured`
/// selectors, then all paragraphs.
pub fn extract_from_html(html: &str, configured: &[String]) -> Option<String> {
    let document = Html::parse_document(html);

    let by_selector = |raw: &str| -> Option<String> {
        let selector = match Selector::parse(raw) {
            Ok(s) => s,
            Err(e) => {
                debug!(selector = raw, error = ?e, "Skipping invalid selector");
                return None;
            }
        };
        let text = non_empty(&element_text(document.select(&selector).next()?))?;
        debug!(selector = raw, chars = text.chars().count(), "Content matched selector");
        Some(text)
    };

    let text = SITE_SELECTORS
        .iter()
        .copied()
        .find_map(&by_selector)
        .or_else(|| configured.iter().map(String::as_str).find_map(&by_selector))
        .or_else(|| {
            let paragraphs: Vec<String> = document
                .select(&PARAGRAPH)
                .filter_map(|p| non_empty(&element_text(p)))
                .collect();
            if paragraphs.is_empty() {
                None
            } else {
                debug!(count = paragraphs.len(), "Content taken from paragraphs");
                Some(paragraphs.join(" "))
            }
        })?;

    clean_content(&text)
}

fn script_source() -> String {
    let selectors = serde_json::to_string(&SITE_SELECTORS).unwrap_or_else(|_| "[]".to_string());
    EXTRACT_SCRIPT.replace("__SELECTORS__", &selectors)
}

/// Navigates to articles and extracts their body text.
pub struct ArticleBodyExtractor<'a> {
    config: &'a RunConfig,
    simulator: &'a HumanSimulator,
}

impl<'a> ArticleBodyExtractor<'a> {
    pub fn new(config: &'a RunConfig, simulator: &'a HumanSimulator) -> Self {
        Self { config, simulator }
    }

    /// Full body text for `record`, or `None` when it cannot be had.
    ///
    /// Opens the first candidate URL that loads, lets the simulator scroll
    /// the page, waits briefly for a known content container and reads the
    /// body out of the HTML. Teaser-length results fall back to an in-page
    /// script, whose text is used only when strictly longer.
    ///
    /// # Arguments
    ///
    /// * `nav` - Navigation controller holding the session's page
    /// * `record` - Listing record; only `article_url` and `article_id` are read
    ///
    /// # Returns
    ///
    /// The cleaned body text. `None` when the record has no URL, no
    /// candidate page loads or nothing survives cleaning. Failures are
    /// logged with the record's id and title, never returned.
    #[instrument(level = "info", skip_all, fields(article_id = %record.label()))]
    pub async fn extract<P: BrowserPage>(
        &self,
        nav: &mut NavigationController<P>,
        record: &ArticleRecord,
    ) -> Option<String> {
        match self.try_extract(nav, record).await {
            Ok(Some(content)) => {
                info!(chars = content.chars().count(), "Extracted article content");
                Some(content)
            }
            Ok(None) => {
                warn!(title = ?record.title, "No content extracted");
                None
            }
            Err(e) => {
                error!(
                    article_id = ?record.article_id,
                    title = ?record.title,
                    error = %e,
                    "Content extraction failed"
                );
                None
            }
        }
    }

    async fn try_extract<P: BrowserPage>(
        &self,
        nav: &mut NavigationController<P>,
        record: &ArticleRecord,
    ) -> Result<Option<String>, PageError> {
        let candidates = self.candidate_urls(record);
        if candidates.is_empty() {
            warn!("Record has no article URL");
            return Ok(None);
        }

        let mut opened = false;
        for url in &candidates {
            info!(%url, "Opening article");
            if nav.navigate(url).await {
                opened = true;
                break;
            }
        }
        if !opened {
            warn!(tried = candidates.len(), "Could not open article page");
            return Ok(None);
        }

        let page = nav.page();
        let mut html = page.content().await?;

        self.simulator.simulate_user_behavior(page).await;
        recapture(page, &mut html).await;

        let probe = self.probe_timeout();
        for selector in SITE_SELECTORS {
            if page.wait_for_selector(selector, probe).await.is_ok() {
                debug!(selector, "Content container present");
                recapture(page, &mut html).await;
                break;
            }
        }

        let content = extract_from_html(&html, &self.config.content_selectors);
        let length = content.as_deref().map_or(0, |c| c.chars().count());
        if length >= MIN_CONTENT_CHARS {
            return Ok(content);
        }

        warn!(chars = length, "Content looks like a teaser; trying in-page extraction");
        match page.evaluate(&script_source()).await {
            Ok(value) => {
                let scripted = value.as_str().and_then(clean_content);
                match scripted {
                    Some(text) if text.chars().count() > length => {
                        info!(chars = text.chars().count(), "In-page extraction found longer text");
                        Ok(Some(text))
                    }
                    _ => Ok(content),
                }
            }
            Err(e) => {
                warn!(error = %truncate_for_log(&e.to_string(), 100), "In-page extraction failed");
                Ok(content)
            }
        }
    }

    /// URLs to try, in order. Off-site links whose id looks like a slug get
    /// the on-site copy tried first.
    fn candidate_urls(&self, record: &ArticleRecord) -> Vec<String> {
        let Some(url) = record.article_url.as_deref().filter(|u| !u.is_empty()) else {
            return Vec::new();
        };
        let Ok(origin) = self.config.site_origin() else {
            return vec![url.to_string()];
        };

        let on_site = url::Url::parse(url)
            .ok()
            .is_some_and(|u| u.host_str() == origin.host_str());
        let slug = record
            .article_id
            .as_deref()
            .filter(|id| !id.is_empty() && !id.contains('.') && !id.contains('/'));

        let mut candidates = Vec::new();
        if !on_site {
            if let Some(local) = slug.and_then(|id| origin.join(id).ok()) {
                candidates.push(local.to_string());
            }
        }
        candidates.push(url.to_string());
        candidates
    }

    fn probe_timeout(&self) -> Duration {
        (self.config.timeout() / SITE_SELECTORS.len() as u32).min(MAX_PROBE)
    }
}

/// Replace `html` with a fresh snapshot when the page has grown.
async fn recapture<P: BrowserPage>(page: &P, html: &mut String) {
    match page.content().await {
        Ok(updated) if updated.len() > html.len() => *html = updated,
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Could not re-read page"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{BehaviorTiming, FixedPolicy};
    use crate::browser::testing::{FailMode, StubPage};
    use serde_json::json;
    use std::sync::Arc;

    const ARTICLE_URL: &str = "https://www.techinasia.com/news/my-post";

    fn record() -> ArticleRecord {
        let mut record = ArticleRecord::new("2025-05-06 10:00:00");
        record.article_id = Some("my-post".to_string());
        record.article_url = Some(ARTICLE_URL.to_string());
        record.title = Some("Hello".to_string());
        record
    }

    fn long_text() -> String {
        "Funding rounds in the region grew again this quarter. ".repeat(6)
    }

    async fn run_extract(page: StubPage, record: &ArticleRecord) -> (Option<String>, StubPage) {
        let config = RunConfig {
            retry_count: 1,
            ..Default::default()
        };
        let simulator = HumanSimulator::new(BehaviorTiming::from(&config), Arc::new(FixedPolicy));
        let extractor = ArticleBodyExtractor::new(&config, &simulator);
        let mut nav = NavigationController::new(page, &config, Arc::new(FixedPolicy));
        let content = extractor.extract(&mut nav, record).await;
        (content, nav.into_page())
    }

    #[test]
    fn test_paragraph_fallback_joins_with_spaces() {
        let html = "<html><body><p>First paragraph.</p><p> Second\n one. </p><p></p></body></html>";
        let configured = vec!["div.nothing-here".to_string()];
        assert_eq!(
            extract_from_html(html, &configured).as_deref(),
            Some("First paragraph. Second one.")
        );
    }

    #[test]
    fn test_inline_markup_keeps_original_spacing() {
        let html = "<p>Read <a>the report</a>, then <b>act</b>.</p><p>Tech<i>In</i>Asia</p>";
        assert_eq!(
            extract_from_html(html, &[]).as_deref(),
            Some("Read the report, then act. TechInAsia")
        );
    }

    #[test]
    fn test_site_selector_wins_over_paragraphs() {
        let html = r#"<p>Teaser</p><div class="content"><p>Body text</p></div>"#;
        assert_eq!(extract_from_html(html, &[]).as_deref(), Some("Body text"));
    }

    #[test]
    fn test_configured_selector_used_before_paragraphs() {
        let html = r#"<p>Outside</p><section class="story"><span>Inside story</span></section>"#;
        let configured = vec!["section.story".to_string()];
        assert_eq!(extract_from_html(html, &configured).as_deref(), Some("Inside story"));
    }

    #[test]
    fn test_boilerplate_is_stripped() {
        let cleaned = clean_content(
            "Real text. Copyright © 2025 Tech in Asia. All Rights Reserved. A member of The Business Times. Please enable JavaScript",
        );
        assert_eq!(cleaned.as_deref(), Some("Real text."));
        assert_eq!(clean_content("Please enable JavaScript"), None);
    }

    #[test]
    fn test_empty_document_yields_none() {
        assert_eq!(extract_from_html("<html><body></body></html>", &[]), None);
    }

    #[test]
    fn test_script_source_embeds_selectors() {
        let script = script_source();
        assert!(script.contains("\"div.post-content\""));
        assert!(!script.contains("__SELECTORS__"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_html_content_skips_script() {
        let html = format!(r#"<div class="content"><p>{}</p></div>"#, long_text());
        let page = StubPage::serving(ARTICLE_URL, &[&html]);

        let (content, page) = run_extract(page, &record()).await;
        assert_eq!(content, Some(long_text().trim().to_string()));
        assert!(page.scripts().iter().all(|s| s.starts_with("window.scrollBy")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_content_replaced_by_longer_script_result() {
        let page = StubPage {
            script_result: Some(json!(long_text())),
            ..StubPage::serving(ARTICLE_URL, &["<p>Short teaser.</p>"])
        };

        let (content, _) = run_extract(page, &record()).await;
        assert_eq!(content, Some(long_text().trim().to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_content_kept_when_script_is_not_longer() {
        let page = StubPage {
            script_result: Some(json!("Tiny")),
            ..StubPage::serving(ARTICLE_URL, &["<p>Short teaser.</p>"])
        };

        let (content, _) = run_extract(page, &record()).await;
        assert_eq!(content.as_deref(), Some("Short teaser."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_length_script_result_does_not_replace_html() {
        // Same char count as "Short teaser.", different text.
        let page = StubPage {
            script_result: Some(json!("Other teaser.")),
            ..StubPage::serving(ARTICLE_URL, &["<p>Short teaser.</p>"])
        };

        let (content, page) = run_extract(page, &record()).await;
        assert_eq!(content.as_deref(), Some("Short teaser."));
        assert!(page.scripts().iter().any(|s| s.contains("div.post-content")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_url_returns_none_without_navigation() {
        let mut bare = record();
        bare.article_url = None;

        let (content, page) = run_extract(StubPage::default(), &bare).await;
        assert!(content.is_none());
        assert!(page.visits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failure_returns_none() {
        let page = StubPage {
            goto_failure: Some(FailMode::Timeout),
            ..Default::default()
        };
        let (content, _) = run_extract(page, &record()).await;
        assert!(content.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_site_link_tries_on_site_copy_first() {
        let mut off_site = record();
        off_site.article_url = Some("https://venturebeat.com/ai/my-post".to_string());
        let html = format!("<article><p>{}</p></article>", long_text());
        let page = StubPage::serving("https://www.techinasia.com/my-post", &[&html]);

        let (content, page) = run_extract(page, &off_site).await;
        assert!(content.is_some());
        assert_eq!(page.visits(), vec!["https://www.techinasia.com/my-post".to_string()]);
    }
}
