//! Scroll-driven crawl of the category listing page.

use super::parser::ArticleFieldParser;
use crate::behavior::{HumanSimulator, SharedPolicy};
use crate::browser::BrowserPage;
use crate::browser::navigation::NavigationController;
use crate::config::RunConfig;
use crate::dedup::Deduplicator;
use crate::models::ArticleRecord;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

static POST_CARD: Lazy<Selector> = Lazy::new(|| Selector::parse("article.post-card").unwrap());
static ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static CARD_LIKE_DIV: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"div[class*="card"], div[class*="article"], div[class*="post"]"#).unwrap()
});

/// Article cards in a listing document.
///
/// Tries `article.post-card`, then any `article`, then card-like `div`s. For
/// the `div` fallback only outermost matches are kept, so a card's own
/// `post-content` wrapper is not mistaken for a second card.
pub fn select_cards(document: &Html) -> Vec<ElementRef<'_>> {
    let cards: Vec<_> = document.select(&POST_CARD).collect();
    if !cards.is_empty() {
        return cards;
    }
    let cards: Vec<_> = document.select(&ARTICLE).collect();
    if !cards.is_empty() {
        debug!("Falling back to bare article elements");
        return cards;
    }

    let divs: Vec<_> = document.select(&CARD_LIKE_DIV).collect();
    let ids: HashSet<_> = divs.iter().map(|d| d.id()).collect();
    if !divs.is_empty() {
        debug!(count = divs.len(), "Falling back to card-like divs");
    }
    divs.into_iter()
        .filter(|d| !d.ancestors().any(|a| ids.contains(&a.id())))
        .collect()
}

/// Walks the listing page for one category.
pub struct ListingCrawler<'a> {
    config: &'a RunConfig,
    parser: &'a ArticleFieldParser,
    simulator: &'a HumanSimulator,
    policy: SharedPolicy,
}

impl<'a> ListingCrawler<'a> {
    pub fn new(
        config: &'a RunConfig,
        parser: &'a ArticleFieldParser,
        simulator: &'a HumanSimulator,
        policy: SharedPolicy,
    ) -> Self {
        Self {
            config,
            parser,
            simulator,
            policy,
        }
    }

    /// Collect up to `num_articles` unique records in discovery order.
    ///
    /// Never fails: navigation or snapshot errors end the crawl and whatever
    /// was gathered so far is returned.
    #[instrument(level = "info", skip_all, fields(category = %self.config.category))]
    pub async fn crawl<P: BrowserPage>(
        &self,
        nav: &mut NavigationController<P>,
        dedup: &mut Deduplicator,
    ) -> Vec<ArticleRecord> {
        let url = self.config.listing_url();
        let quota = self.config.num_articles;
        let mut records = Vec::new();

        if !nav.navigate(&url).await {
            error!(%url, "Could not open listing page");
            return records;
        }

        match nav.page().content().await {
            Ok(html) => self.harvest(&html, dedup, &mut records),
            Err(e) => {
                warn!(error = %e, "Could not read listing page");
                return records;
            }
        }
        info!(found = records.len(), "Harvested first page");

        let mut scrolls_done = 0;
        while scrolls_done < self.config.max_scrolls && records.len() < quota {
            scrolls_done += 1;
            self.simulator.simulate_scrolling(nav.page()).await;

            let html = match nav.page().content().await {
                Ok(html) => html,
                Err(e) => {
                    warn!(error = %e, scrolls_done, "Snapshot failed; stopping crawl");
                    break;
                }
            };
            let before = records.len();
            self.harvest(&html, dedup, &mut records);
            info!(
                scroll = scrolls_done,
                max = self.config.max_scrolls,
                new = records.len() - before,
                total = records.len(),
                quota,
                "Scroll harvested"
            );

            if records.len() >= quota {
                break;
            }
            sleep(self.policy.delay(self.config.request_delay_range)).await;
        }

        info!(
            found = records.len(),
            scrolls_done,
            duplicates = dedup.duplicates(),
            "Listing crawl finished"
        );
        records
    }

    /// Parse every card in `html`, appending new records until the quota.
    ///
    /// Cards already accepted from an earlier snapshot are skipped quietly;
    /// an id repeated within this snapshot counts as a duplicate.
    fn harvest(&self, html: &str, dedup: &mut Deduplicator, records: &mut Vec<ArticleRecord>) {
        let document = Html::parse_document(html);
        let cards = select_cards(&document);
        debug!(cards = cards.len(), "Selected article cards");

        let mut in_snapshot = HashSet::new();
        for card in cards {
            if records.len() >= self.config.num_articles {
                break;
            }
            let Some(record) = self.parser.parse(card) else {
                continue;
            };
            if !record.is_valid() {
                continue;
            }
            let Some(id) = record.article_id.clone() else {
                continue;
            };

            if !in_snapshot.insert(id.clone()) {
                dedup.note_duplicate();
                debug!(article_id = %id, "Duplicate card in snapshot");
                continue;
            }
            if dedup.seen(&id) {
                continue;
            }
            dedup.mark(&id);
            records.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{BehaviorTiming, FixedPolicy};
    use crate::browser::testing::{FailMode, StubPage};
    use std::sync::Arc;

    fn card(slug: &str) -> String {
        format!(r#"<article class="post-card"><h3 class="post-title"><a href="/{slug}">{slug}</a></h3></article>"#)
    }

    fn page_of(slugs: &[&str]) -> String {
        let cards: String = slugs.iter().map(|s| card(s)).collect();
        format!("<html><body>{cards}</body></html>")
    }

    struct Fixture {
        config: RunConfig,
        parser: ArticleFieldParser,
        simulator: HumanSimulator,
    }

    impl Fixture {
        fn new(config: RunConfig) -> Self {
            let parser = ArticleFieldParser::from_config(&config).unwrap();
            let simulator =
                HumanSimulator::new(BehaviorTiming::from(&config), Arc::new(FixedPolicy));
            Self {
                config,
                parser,
                simulator,
            }
        }

        async fn crawl(&self, page: StubPage) -> (Vec<ArticleRecord>, Deduplicator, StubPage) {
            let crawler =
                ListingCrawler::new(&self.config, &self.parser, &self.simulator, Arc::new(FixedPolicy));
            let mut nav = NavigationController::new(page, &self.config, Arc::new(FixedPolicy));
            let mut dedup = Deduplicator::new();
            let records = crawler.crawl(&mut nav, &mut dedup).await;
            (records, dedup, nav.into_page())
        }
    }

    fn ids(records: &[ArticleRecord]) -> Vec<&str> {
        records.iter().filter_map(|r| r.article_id.as_deref()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_scrolls_returns_first_page() {
        let fx = Fixture::new(RunConfig {
            max_scrolls: 0,
            ..Default::default()
        });
        let url = fx.config.listing_url();
        let page = StubPage::serving(&url, &[&page_of(&["a", "b"]), &page_of(&["a", "b", "c"])]);

        let (records, _, page) = fx.crawl(page).await;
        assert_eq!(ids(&records), vec!["a", "b"]);
        assert_eq!(page.scroll_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrolling_accumulates_unique_records() {
        let fx = Fixture::new(RunConfig {
            max_scrolls: 5,
            ..Default::default()
        });
        let url = fx.config.listing_url();
        let page = StubPage::serving(
            &url,
            &[&page_of(&["a", "b"]), &page_of(&["a", "b", "c"]), &page_of(&["a", "b", "c", "d"])],
        );

        let (records, dedup, _) = fx.crawl(page).await;
        assert_eq!(ids(&records), vec!["a", "b", "c", "d"]);
        assert_eq!(dedup.unique_count(), 4);
        assert_eq!(dedup.duplicates(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeats_within_snapshot_count_as_duplicates() {
        let fx = Fixture::new(RunConfig {
            max_scrolls: 0,
            ..Default::default()
        });
        let url = fx.config.listing_url();
        let page = StubPage::serving(&url, &[&page_of(&["a", "a", "b"])]);

        let (records, dedup, _) = fx.crawl(page).await;
        assert_eq!(ids(&records), vec!["a", "b"]);
        assert_eq!(dedup.duplicates(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_quota() {
        let fx = Fixture::new(RunConfig {
            num_articles: 3,
            max_scrolls: 10,
            ..Default::default()
        });
        let url = fx.config.listing_url();
        let page = StubPage::serving(
            &url,
            &[&page_of(&["a", "b"]), &page_of(&["a", "b", "c", "d", "e"])],
        );

        let (records, _, page) = fx.crawl(page).await;
        assert_eq!(ids(&records), vec!["a", "b", "c"]);
        // One scroll burst of three actions reached the quota.
        assert_eq!(page.scroll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failure_returns_empty() {
        let fx = Fixture::new(RunConfig {
            retry_count: 2,
            ..Default::default()
        });
        let page = StubPage {
            goto_failure: Some(FailMode::Transport),
            ..Default::default()
        };

        let (records, _, page) = fx.crawl(page).await;
        assert!(records.is_empty());
        assert_eq!(page.visits().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_failure_keeps_first_page() {
        let fx = Fixture::new(RunConfig {
            max_scrolls: 5,
            ..Default::default()
        });
        let url = fx.config.listing_url();
        let page = StubPage {
            content_failure_after_scrolls: Some(1),
            ..StubPage::serving(&url, &[&page_of(&["a", "b"]), &page_of(&["a", "b", "c"])])
        };

        let (records, dedup, page) = fx.crawl(page).await;
        assert_eq!(ids(&records), vec!["a", "b"]);
        assert_eq!(dedup.unique_count(), 2);
        // The crawl stopped after the first scroll burst.
        assert_eq!(page.scroll_count(), 3);
    }

    #[test]
    fn test_select_cards_div_fallback_keeps_outermost() {
        let document = Html::parse_document(
            r#"<div class="news-card"><div class="post-content"><a href="/x">X</a></div></div>
               <div class="news-card"><a href="/y">Y</a></div>
               <div class="sidebar">ignored</div>"#,
        );
        let cards = select_cards(&document);
        assert_eq!(cards.len(), 2);
    }
}
