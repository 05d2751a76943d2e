//! Navigation with bounded retries and exponential backoff.
//!
//! [`NavigationController`] owns the session's page handle. Every other
//! component borrows the page through it, so there is exactly one writer.
//!
//! # Backoff Strategy
//!
//! After a failed attempt (except the last) the controller sleeps:
//!
//! ```text
//! timeout:          2^attempt + jitter(0..1) seconds
//! transport error:  3^attempt + jitter(1..3) seconds
//! ```
//!
//! When the error says the connection or target was closed, the page is
//! recreated before the next attempt.

use super::{BrowserPage, PageError};
use crate::behavior::SharedPolicy;
use crate::config::RunConfig;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

const TIMEOUT_BASE: f64 = 2.0;
const TIMEOUT_JITTER: (f64, f64) = (0.0, 1.0);
const TRANSPORT_BASE: f64 = 3.0;
const TRANSPORT_JITTER: (f64, f64) = (1.0, 3.0);

pub struct NavigationController<P> {
    page: P,
    retry_count: u32,
    timeout: Duration,
    policy: SharedPolicy,
}

impl<P> std::fmt::Debug for NavigationController<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationController")
            .field("retry_count", &self.retry_count)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<P: BrowserPage> NavigationController<P> {
    pub fn new(page: P, config: &RunConfig, policy: SharedPolicy) -> Self {
        Self {
            page,
            retry_count: config.retry_count,
            timeout: config.timeout(),
            policy,
        }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    /// Give the page back, e.g. to close it.
    pub fn into_page(self) -> P {
        self.page
    }

    /// Navigate to `url`, retrying up to `retry_count` times.
    ///
    /// Failed attempts other than the last are followed by a backoff sleep
    /// (see the module docs). A closed connection also triggers page
    /// recreation; if that fails too it is logged and the next attempt
    /// goes ahead on the old handle.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL to load
    ///
    /// # Returns
    ///
    /// `true` once a load succeeds, `false` after every attempt has failed.
    /// The cause is logged, never returned.
    #[instrument(level = "info", skip(self))]
    pub async fn navigate(&mut self, url: &str) -> bool {
        let total_t0 = Instant::now();

        for attempt in 0..self.retry_count {
            info!(attempt = attempt + 1, max = self.retry_count, "Navigating");
            let e = match self.page.goto(url, self.timeout).await {
                Ok(()) => {
                    info!(elapsed_ms = total_t0.elapsed().as_millis(), "Page loaded");
                    return true;
                }
                Err(e) => e,
            };

            if attempt + 1 >= self.retry_count {
                error!(
                    attempt = attempt + 1,
                    max = self.retry_count,
                    elapsed_ms_total = total_t0.elapsed().as_millis(),
                    error = %e,
                    "Navigation exhausted retries"
                );
                return false;
            }

            let delay = self.backoff(attempt, &e);
            warn!(
                attempt = attempt + 1,
                max = self.retry_count,
                ?delay,
                error = %e,
                "Navigation attempt failed; backing off"
            );
            sleep(delay).await;

            if e.is_closed() {
                info!("Recreating page after closed connection");
                match self.page.recreate().await {
                    Ok(()) => info!("Recreated browser page"),
                    Err(re) => error!(error = %re, "Failed to recreate page"),
                }
            }
        }
        false
    }

    fn backoff(&self, attempt: u32, error: &PageError) -> Duration {
        let (base, (lo, hi)) = if error.is_timeout() {
            (TIMEOUT_BASE, TIMEOUT_JITTER)
        } else {
            (TRANSPORT_BASE, TRANSPORT_JITTER)
        };
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = base.powi(exponent) + self.policy.uniform(lo, hi);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}
