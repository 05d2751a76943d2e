//! Run orchestration.
//!
//! A [`Pipeline`] performs one complete run:
//!
//! ```text
//! Idle → SessionOpen → ListingCrawled → ContentEnriched → Persisted → Closed
//!   └──────────→ Aborted (session could not be opened)
//! ```
//!
//! A crawl that finds nothing goes from `ListingCrawled` straight to
//! `Persisted`. Once a session is open it is closed exactly once, whatever
//! happens in between.

use crate::behavior::{BehaviorTiming, HumanSimulator, SharedPolicy};
use crate::browser::navigation::NavigationController;
use crate::browser::{BrowserPage, Identity, PageError, SessionFactory};
use crate::config::{ConfigError, RunConfig};
use crate::dedup::Deduplicator;
use crate::models::{ArticleRecord, RunStats};
use crate::outputs::ArticleStore;
use crate::scrapers::content::ArticleBodyExtractor;
use crate::scrapers::listing::ListingCrawler;
use crate::scrapers::parser::ArticleFieldParser;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    SessionOpen,
    ListingCrawled,
    ContentEnriched,
    Persisted,
    Closed,
    Aborted,
}

/// Failures that end a run before any records are produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("could not open browser session: {0}")]
    Session(#[source] PageError),
}

/// Outcome of a run.
#[derive(Debug)]
pub struct RunReport {
    /// Unique records in discovery order, enriched where possible.
    pub records: Vec<ArticleRecord>,
    pub stats: RunStats,
    /// Final state; `Closed` for every run that opened a session.
    pub state: PipelineState,
    /// Locations reported by the store, one per saved batch.
    pub saved: Vec<PathBuf>,
}

pub struct Pipeline<F, S> {
    config: RunConfig,
    factory: F,
    store: S,
    policy: SharedPolicy,
    parser: ArticleFieldParser,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl<F: SessionFactory, S: ArticleStore> Pipeline<F, S> {
    /// Validate `config` and prepare a run. Nothing is opened yet.
    pub fn new(
        config: RunConfig,
        factory: F,
        store: S,
        policy: SharedPolicy,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let parser = ArticleFieldParser::from_config(&config)?;
        Ok(Self {
            config,
            factory,
            store,
            policy,
            parser,
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        })
    }

    /// Every state the pipeline has passed through, starting with `Idle`.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = ?self.state, to = ?next, "Pipeline state change");
        self.state = next;
        self.history.push(next);
    }

    /// Run once: open a session, crawl, enrich, persist, close.
    ///
    /// The session is opened with a randomized identity. The listing is
    /// crawled up to `num_articles` unique records and each record is then
    /// visited for its body text, with a randomized pause between articles.
    /// Records are handed to the store in `batch_size` chunks and the
    /// session is closed exactly once, whatever happened before.
    ///
    /// # Returns
    ///
    /// A [`RunReport`] with the records, counters, saved batch locations
    /// and final state. An empty listing still reaches `Closed` with no
    /// batches written.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Session`] when the browser cannot be opened; the
    /// state is then `Aborted`. Every later failure is logged and degrades
    /// into the report's statistics instead.
    #[instrument(level = "info", skip_all, fields(category = %self.config.category))]
    pub async fn run(&mut self) -> Result<RunReport, PipelineError> {
        let t0 = Instant::now();
        let identity = self.choose_identity();

        let page = match self.factory.open(&identity).await {
            Ok(page) => page,
            Err(e) => {
                error!(error = %e, "Failed to open browser session");
                self.transition(PipelineState::Aborted);
                return Err(PipelineError::Session(e));
            }
        };
        self.transition(PipelineState::SessionOpen);

        let simulator = HumanSimulator::new(BehaviorTiming::from(&self.config), self.policy.clone());
        let mut nav = NavigationController::new(page, &self.config, self.policy.clone());
        let mut dedup = Deduplicator::new();

        let listed = ListingCrawler::new(&self.config, &self.parser, &simulator, self.policy.clone())
            .crawl(&mut nav, &mut dedup)
            .await;
        self.transition(PipelineState::ListingCrawled);

        let mut stats = RunStats {
            found: dedup.unique_count() + dedup.duplicates(),
            valid: listed.len(),
            duplicates: dedup.duplicates(),
            ..Default::default()
        };

        let mut saved = Vec::new();
        let records = if listed.is_empty() {
            warn!("Listing produced no articles; nothing to enrich or save");
            self.transition(PipelineState::Persisted);
            listed
        } else {
            let records = self.enrich(&mut nav, &simulator, listed, &mut stats).await;
            self.transition(PipelineState::ContentEnriched);
            saved = self.persist(&records).await;
            self.transition(PipelineState::Persisted);
            records
        };

        if let Err(e) = nav.into_page().close().await {
            warn!(error = %e, "Browser session did not close cleanly");
        }
        self.transition(PipelineState::Closed);

        stats.duration = t0.elapsed();
        log_summary(&stats, saved.len());

        Ok(RunReport {
            records,
            stats,
            state: self.state,
            saved,
        })
    }

    /// Pick the user agent and window size for this run's session.
    fn choose_identity(&self) -> Identity {
        let user_agent = if self.config.randomize_user_agent {
            self.policy
                .pick(self.config.user_agents.len())
                .map(|i| self.config.user_agents[i].clone())
        } else {
            None
        };
        let viewport = if self.config.randomize_viewport {
            self.policy
                .pick(self.config.viewport_sizes.len())
                .map(|i| self.config.viewport_sizes[i])
        } else {
            None
        };
        Identity {
            user_agent,
            viewport,
            headless: self.config.headless,
        }
    }

    /// Fetch the body of every record, one at a time, pausing between
    /// articles. Records whose body cannot be extracted are kept as-is.
    async fn enrich<P: BrowserPage>(
        &self,
        nav: &mut NavigationController<P>,
        simulator: &HumanSimulator,
        records: Vec<ArticleRecord>,
        stats: &mut RunStats,
    ) -> Vec<ArticleRecord> {
        let extractor = ArticleBodyExtractor::new(&self.config, simulator);
        let total = records.len();
        let mut enriched = Vec::with_capacity(total);

        for (i, record) in records.into_iter().enumerate() {
            info!(index = i + 1, total, article_id = %record.label(), "Enriching article");
            match extractor.extract(nav, &record).await {
                Some(content) => {
                    stats.enriched += 1;
                    enriched.push(record.with_content(content));
                }
                None => {
                    stats.incomplete += 1;
                    enriched.push(record);
                }
            }

            if i + 1 < total {
                let delay = self.policy.delay(self.config.request_delay_range);
                debug!(?delay, "Pausing before next article");
                sleep(delay).await;
            }
        }
        enriched
    }

    /// Hand records to the store in `batch_size` chunks. A failed batch is
    /// logged and the remaining ones are still attempted.
    async fn persist(&self, records: &[ArticleRecord]) -> Vec<PathBuf> {
        let mut saved = Vec::new();
        for (n, batch) in records.chunks(self.config.batch_size).enumerate() {
            match self.store.save_batch(batch).await {
                Ok(path) => {
                    info!(batch = n + 1, count = batch.len(), path = %path.display(), "Saved batch");
                    saved.push(path);
                }
                Err(e) => error!(batch = n + 1, count = batch.len(), error = %e, "Failed to save batch"),
            }
        }
        saved
    }
}

fn log_summary(stats: &RunStats, batches: usize) {
    info!(
        found = stats.found,
        valid = stats.valid,
        duplicates = stats.duplicates,
        enriched = stats.enriched,
        incomplete = stats.incomplete,
        batches,
        duration_secs = stats.duration.as_secs_f64(),
        articles_per_sec = stats.articles_per_second(),
        "Run complete"
    );
}
