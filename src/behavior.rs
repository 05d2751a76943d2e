//! Randomized timing and simulated user input.
//!
//! Two pieces live here:
//! - [`RandomizationPolicy`]: turns configured ranges into concrete values.
//!   [`ThreadRngPolicy`] is the production implementation; tests plug in a
//!   deterministic one.
//! - [`HumanSimulator`]: scrolls and moves the mouse on a page with randomized
//!   pacing. It never fails to its caller; problems are logged and the
//!   simulation simply stops early.

use crate::browser::{BrowserPage, PageError};
use crate::config::RunConfig;
use rand::{Rng, rng};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Source of randomized values. Implementations must accept `lo == hi`.
pub trait RandomizationPolicy {
    /// A value in `lo..=hi`.
    fn uniform(&self, lo: f64, hi: f64) -> f64;

    /// An integer in `lo..=hi`.
    fn int_between(&self, lo: u32, hi: u32) -> u32;

    /// An index into a slice of `len` items, or `None` when empty.
    fn pick(&self, len: usize) -> Option<usize>;

    /// A delay drawn from a `(lo, hi)` range of seconds, saturating at
    /// [`Duration::MAX`].
    fn delay(&self, (lo, hi): (f64, f64)) -> Duration {
        Duration::try_from_secs_f64(self.uniform(lo, hi).max(0.0)).unwrap_or(Duration::MAX)
    }
}

pub type SharedPolicy = Arc<dyn RandomizationPolicy + Send + Sync>;

/// Policy backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngPolicy;

impl RandomizationPolicy for ThreadRngPolicy {
    fn uniform(&self, lo: f64, hi: f64) -> f64 {
        if lo >= hi {
            lo
        } else {
            rng().random_range(lo..=hi)
        }
    }

    fn int_between(&self, lo: u32, hi: u32) -> u32 {
        if lo >= hi {
            lo
        } else {
            rng().random_range(lo..=hi)
        }
    }

    fn pick(&self, len: usize) -> Option<usize> {
        (len > 0).then(|| rng().random_range(0..len))
    }
}

/// Always returns the low end of every range.
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FixedPolicy;

#[cfg(test)]
impl RandomizationPolicy for FixedPolicy {
    fn uniform(&self, lo: f64, _hi: f64) -> f64 {
        lo
    }

    fn int_between(&self, lo: u32, _hi: u32) -> u32 {
        lo
    }

    fn pick(&self, len: usize) -> Option<usize> {
        (len > 0).then_some(0)
    }
}

/// Ranges that drive the simulated input.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorTiming {
    pub scroll_iterations_range: (u32, u32),
    pub scroll_distance_range: (u32, u32),
    pub sleep_scroll_range: (f64, f64),
    pub mouse_movements_range: (u32, u32),
    pub sleep_mouse_range: (f64, f64),
    pub reading_delay_range: (f64, f64),
}

impl From<&RunConfig> for BehaviorTiming {
    fn from(config: &RunConfig) -> Self {
        Self {
            scroll_iterations_range: config.scroll_iterations_range,
            scroll_distance_range: config.scroll_distance_range,
            sleep_scroll_range: config.sleep_scroll_range,
            mouse_movements_range: config.mouse_movements_range,
            sleep_mouse_range: config.sleep_mouse_range,
            reading_delay_range: config.reading_delay_range,
        }
    }
}

/// Simulates a reader scrolling and pointing around a page.
pub struct HumanSimulator {
    timing: BehaviorTiming,
    policy: SharedPolicy,
}

impl HumanSimulator {
    pub fn new(timing: BehaviorTiming, policy: SharedPolicy) -> Self {
        Self { timing, policy }
    }

    /// Scroll down in a few randomized steps.
    pub async fn simulate_scrolling<P: BrowserPage>(&self, page: &P) {
        if let Err(e) = self.scroll(page).await {
            warn!(error = %e, "Scroll simulation stopped early");
        }
    }

    /// Scroll, wander with the mouse, then pause as if reading.
    pub async fn simulate_user_behavior<P: BrowserPage>(&self, page: &P) {
        debug!("Starting human behavior simulation");
        if let Err(e) = self.scroll(page).await {
            warn!(error = %e, "Scroll simulation stopped early");
        }
        if let Err(e) = self.wander(page).await {
            warn!(error = %e, "Mouse simulation stopped early");
        }
        let reading = self.policy.delay(self.timing.reading_delay_range);
        debug!(?reading, "Simulating reading delay");
        sleep(reading).await;
    }

    async fn scroll<P: BrowserPage>(&self, page: &P) -> Result<(), PageError> {
        let (lo, hi) = self.timing.scroll_iterations_range;
        let iterations = self.policy.int_between(lo, hi);
        info!(iterations, "Simulating scroll actions");

        for i in 0..iterations {
            let (lo, hi) = self.timing.scroll_distance_range;
            let distance = self.policy.int_between(lo, hi);
            page.evaluate(&format!("window.scrollBy(0, {distance})")).await?;
            sleep(self.policy.delay(self.timing.sleep_scroll_range)).await;
            debug!(step = i + 1, iterations, distance, "Scrolled");
        }
        Ok(())
    }

    async fn wander<P: BrowserPage>(&self, page: &P) -> Result<(), PageError> {
        let (lo, hi) = self.timing.mouse_movements_range;
        let movements = self.policy.int_between(lo, hi);
        debug!(movements, "Simulating mouse movements");

        for i in 0..movements {
            let x = self.policy.int_between(100, 1000);
            let y = self.policy.int_between(100, 800);
            page.move_mouse(x as f64, y as f64).await?;
            sleep(self.policy.delay(self.timing.sleep_mouse_range)).await;
            debug!(step = i + 1, movements, x, y, "Moved mouse");
        }
        Ok(())
    }
}
