//! Article card parser.
//!
//! [`ArticleFieldParser`] turns one listing card into an [`ArticleRecord`].
//! Each field is read through an ordered list of strategies; the first one
//! that returns a value wins. Parsing never fails to the caller: a card
//! without a usable link yields `None` and every other field is optional.

use super::element_text;
use crate::config::{ConfigError, RunConfig};
use crate::models::{ArticleRecord, NOT_AVAILABLE};
use crate::utils::non_empty;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::{debug, instrument};
use url::Url;

/// Display format for `posted_time`, e.g. `"09:30 AM at May 06, 2025"`.
pub const POSTED_TIME_FORMAT: &str = "%I:%M %p at %b %d, %Y";

/// Longest span text still considered a source name.
const MAX_SOURCE_CHARS: usize = 30;

static POST_CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse("div.post-content").unwrap());
static CONTENT_LIKE_DIV: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"div[class*="content"], div[class*="article"]"#).unwrap()
});
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static ANY_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static POST_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h3.post-title").unwrap());
static H3: Lazy<Selector> = Lazy::new(|| Selector::parse("h3").unwrap());
static SOURCE_NAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.post-source-name").unwrap());
static SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span").unwrap());
static SOURCE_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.post-source").unwrap());
static POST_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.post-image img[src]").unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").unwrap());
static STYLED: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[style*="background-image"]"#).unwrap());
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time").unwrap());
static CATEGORY_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.category-link").unwrap());
static TAG_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.tag-link").unwrap());

static BACKGROUND_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(['"]?(.*?)['"]?\)"#).unwrap());
static RECENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(ago|hour|day|week|month|year|yesterday|today)").unwrap());

type Strategy<T> = for<'x> fn(ElementRef<'x>) -> Option<T>;

fn first_match<T>(element: ElementRef<'_>, strategies: &[Strategy<T>]) -> Option<T> {
    strategies.iter().find_map(|strategy| strategy(element))
}

fn first_text<'a>(element: ElementRef<'a>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|el| non_empty(&element_text(el)))
}

fn texts<'a>(element: ElementRef<'a>, selector: &Selector) -> Vec<String> {
    element
        .select(selector)
        .filter_map(|el| non_empty(&element_text(el)))
        .unique()
        .collect()
}

// Content container.

fn container_post_content(card: ElementRef<'_>) -> Option<ElementRef<'_>> {
    card.select(&POST_CONTENT).next()
}

fn container_content_like(card: ElementRef<'_>) -> Option<ElementRef<'_>> {
    card.select(&CONTENT_LIKE_DIV).next()
}

// Title.

fn title_post_title(el: ElementRef<'_>) -> Option<String> {
    first_text(el, &POST_TITLE)
}

fn title_any_h3(el: ElementRef<'_>) -> Option<String> {
    first_text(el, &H3)
}

fn title_first_link(el: ElementRef<'_>) -> Option<String> {
    first_text(el, &ANY_LINK)
}

// Source.

fn source_named_span(el: ElementRef<'_>) -> Option<String> {
    first_text(el, &SOURCE_NAME)
}

fn source_short_span(el: ElementRef<'_>) -> Option<String> {
    el.select(&SPAN)
        .filter_map(|span| non_empty(&element_text(span)))
        .find(|text| text.chars().count() < MAX_SOURCE_CHARS)
}

fn source_link_classed(el: ElementRef<'_>) -> Option<String> {
    el.select(&SOURCE_LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(non_empty)
}

fn source_link_second(el: ElementRef<'_>) -> Option<String> {
    el.select(&ANY_LINK)
        .nth(1)
        .and_then(|a| a.value().attr("href"))
        .and_then(non_empty)
}

// Image.

fn image_post_image(el: ElementRef<'_>) -> Option<String> {
    el.select(&POST_IMAGE)
        .find_map(|img| img.value().attr("src").and_then(non_empty))
}

fn image_any_img(el: ElementRef<'_>) -> Option<String> {
    el.select(&IMG)
        .find_map(|img| img.value().attr("src").and_then(non_empty))
}

fn image_background(el: ElementRef<'_>) -> Option<String> {
    let style = el.select(&STYLED).next()?.value().attr("style")?;
    BACKGROUND_URL
        .captures(style)
        .and_then(|caps| caps.get(1))
        .and_then(|m| non_empty(m.as_str()))
}

/// Parse a `datetime` attribute into `(posted_time, posted_time_iso)`.
///
/// Accepts RFC 3339, naive ISO timestamps (read as UTC) and bare dates.
pub fn parse_datetime(raw: &str) -> Option<(String, String)> {
    let raw = raw.trim();
    let instant: DateTime<FixedOffset> = if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        naive.and_utc().fixed_offset()
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        naive.and_utc().fixed_offset()
    } else {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
            .and_utc()
            .fixed_offset()
    };
    Some((
        instant.format(POSTED_TIME_FORMAT).to_string(),
        instant.to_rfc3339(),
    ))
}

/// Extracts [`ArticleRecord`]s from listing cards.
#[derive(Debug, Clone)]
pub struct ArticleFieldParser {
    origin: Url,
    category: String,
}

impl ArticleFieldParser {
    /// `origin` is used to resolve relative links; `category` is the
    /// fallback when a card lists no categories.
    pub fn new(origin: Url, category: impl Into<String>) -> Self {
        Self {
            origin,
            category: category.into(),
        }
    }

    pub fn from_config(config: &RunConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.site_origin()?, config.category.clone()))
    }

    /// Parse a card, stamping `scraped_at` with the current time.
    pub fn parse(&self, card: ElementRef<'_>) -> Option<ArticleRecord> {
        self.parse_at(card, ArticleRecord::now_stamp())
    }

    /// Parse a card with an explicit `scraped_at`, so the result depends
    /// only on the markup.
    #[instrument(level = "debug", skip_all)]
    pub fn parse_at(&self, card: ElementRef<'_>, scraped_at: impl Into<String>) -> Option<ArticleRecord> {
        let container = container_post_content(card)
            .or_else(|| container_content_like(card))
            .unwrap_or(card);

        let Some((article_id, article_url)) = self
            .link(container)
            .or_else(|| self.link(card))
        else {
            debug!("Card has no usable article link");
            return None;
        };

        let mut record = ArticleRecord::new(scraped_at);
        record.title = first_match(container, &[title_post_title, title_any_h3, title_first_link]);
        record.source = first_match(container, &[source_named_span, source_short_span]);
        record.source_url = first_match(container, &[source_link_classed, source_link_second])
            .and_then(|href| self.resolve(&href))
            .map(String::from);
        record.image_url = first_match(card, &[image_post_image, image_any_img, image_background]);

        let (posted_time, posted_time_iso, relative_time) = time_info(card);
        record.posted_time = posted_time;
        record.posted_time_iso = posted_time_iso;
        record.relative_time = relative_time;

        record.categories = texts(card, &CATEGORY_LINK);
        if record.categories.is_empty() {
            record.categories = vec![self.category.clone()];
        }
        record.tags = texts(card, &TAG_LINK);

        debug!(article_id = %article_id, "Parsed article card");
        record.article_id = Some(article_id);
        record.article_url = Some(article_url);
        Some(record)
    }

    /// First anchor with a non-empty `href` that resolves to an http(s) URL,
    /// paired with the id derived from it.
    fn link(&self, scope: ElementRef<'_>) -> Option<(String, String)> {
        scope.select(&LINK).find_map(|a| {
            let href = a.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            let url = self.resolve(href)?;
            Some((article_id(&url)?, url.to_string()))
        })
    }

    fn resolve(&self, href: &str) -> Option<Url> {
        let url = self.origin.join(href).ok()?;
        matches!(url.scheme(), "http" | "https").then_some(url)
    }
}

/// Last non-empty path segment, or the host without `www.` for bare links.
fn article_id(url: &Url) -> Option<String> {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string);
    segment.or_else(|| {
        url.host_str()
            .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
    })
}

/// `(posted_time, posted_time_iso, relative_time)` for a card.
fn time_info(card: ElementRef<'_>) -> (Option<String>, Option<String>, String) {
    match card.select(&TIME).next() {
        Some(time) => {
            let relative = non_empty(&element_text(time)).unwrap_or_else(|| NOT_AVAILABLE.to_string());
            match time.value().attr("datetime").and_then(parse_datetime) {
                Some((posted, iso)) => (Some(posted), Some(iso), relative),
                None => (None, None, relative),
            }
        }
        None => {
            let relative = card
                .select(&SPAN)
                .filter_map(|span| non_empty(&element_text(span)))
                .find(|text| RECENCY.is_match(text))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            (None, None, relative)
        }
    }
}
