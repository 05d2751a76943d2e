//! Headless Chromium session backed by `chromiumoxide`.
//!
//! [`ChromeLauncher`] starts a browser with the chosen [`Identity`] and
//! spawns the CDP handler loop; [`ChromeSession`] owns the browser, the
//! active tab and that handler task until [`BrowserPage::close`] is called.

use super::{BrowserPage, Identity, PageError, SessionFactory};
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::layout::Point;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, instrument, warn};

const SELECTOR_POLL: Duration = Duration::from_millis(100);

fn cdp_error(e: CdpError) -> PageError {
    match e {
        CdpError::Timeout => PageError::Timeout,
        other => PageError::from_message(other.to_string()),
    }
}

/// Launches local Chromium instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeLauncher;

impl SessionFactory for ChromeLauncher {
    type Page = ChromeSession;

    #[instrument(level = "info", skip_all, fields(headless = identity.headless))]
    async fn open(&self, identity: &Identity) -> Result<ChromeSession, PageError> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .viewport(None::<chromiumoxide::handler::viewport::Viewport>);

        if !identity.headless {
            builder = builder.with_head();
        }
        if let Some(viewport) = identity.viewport {
            info!(width = viewport.width, height = viewport.height, "Using window size");
            builder = builder.window_size(viewport.width, viewport.height);
        }
        if let Some(ua) = &identity.user_agent {
            info!(user_agent = %crate::utils::truncate_for_log(ua, 30), "Using user agent");
            builder = builder.arg(format!("--user-agent={ua}"));
        }

        let config = builder.build().map_err(PageError::Launch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PageError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(cdp_error)?;
        info!("Browser session opened");

        Ok(ChromeSession {
            browser,
            page,
            handler_task,
        })
    }
}

/// One browser with one active tab.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl BrowserPage for ChromeSession {
    async fn goto(&self, url: &str, limit: Duration) -> Result<(), PageError> {
        match timeout(limit, self.page.goto(url)).await {
            Err(_) => Err(PageError::Timeout),
            Ok(Err(e)) => Err(cdp_error(e)),
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn content(&self) -> Result<String, PageError> {
        self.page.content().await.map_err(cdp_error)
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, PageError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| match cdp_error(e) {
                PageError::Transport(msg) => PageError::Script(msg),
                other => other,
            })?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn wait_for_selector(&self, selector: &str, limit: Duration) -> Result<(), PageError> {
        let deadline = Instant::now() + limit;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PageError::SelectorNotFound(selector.to_string()));
            }
            sleep(SELECTOR_POLL).await;
        }
    }

    async fn move_mouse(&self, x: f64, y: f64) -> Result<(), PageError> {
        self.page
            .move_mouse(Point::new(x, y))
            .await
            .map(|_| ())
            .map_err(cdp_error)
    }

    async fn recreate(&mut self) -> Result<(), PageError> {
        let fresh = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(cdp_error)?;
        let stale = std::mem::replace(&mut self.page, fresh);
        if let Err(e) = stale.close().await {
            debug!(error = %e, "Stale page did not close cleanly");
        }
        Ok(())
    }

    async fn close(self) -> Result<(), PageError> {
        let ChromeSession {
            mut browser,
            page,
            handler_task,
        } = self;

        if let Err(e) = page.close().await {
            debug!(error = %e, "Page close error");
        }
        let closed = browser.close().await.map(|_| ()).map_err(cdp_error);
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        handler_task.abort();
        closed
    }
}
