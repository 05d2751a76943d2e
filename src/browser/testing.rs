//! Scripted pages and sessions for unit tests.

use super::{BrowserPage, Identity, PageError, SessionFactory};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailMode {
    Timeout,
    Closed,
    Transport,
}

impl FailMode {
    pub(crate) fn error(self) -> PageError {
        match self {
            FailMode::Timeout => PageError::Timeout,
            FailMode::Closed => PageError::from_message("Connection closed"),
            FailMode::Transport => PageError::from_message("net::ERR_CONNECTION_RESET"),
        }
    }
}

/// A page whose behaviour is fixed up front.
///
/// `documents` maps a URL to the markup served after 0, 1, 2, ... scroll
/// actions; the last entry is repeated once scrolling runs past the end.
#[derive(Default)]
pub(crate) struct StubPage {
    pub documents: HashMap<String, Vec<String>>,
    /// Applied to every navigation when set.
    pub goto_failure: Option<FailMode>,
    /// Consumed one per navigation before `goto_failure` is consulted.
    pub goto_script: RefCell<VecDeque<Option<FailMode>>>,
    pub script_failure: Option<FailMode>,
    /// `content()` fails once this many scroll actions have happened.
    pub content_failure_after_scrolls: Option<usize>,
    /// Returned by `recreate()` after the attempt is counted.
    pub recreate_failure: Option<FailMode>,
    /// Returned by non-scroll `evaluate` calls.
    pub script_result: Option<serde_json::Value>,
    pub present_selectors: Vec<String>,
    pub closed: Rc<Cell<usize>>,
    pub current: RefCell<String>,
    pub scrolls: Cell<usize>,
    pub visits: RefCell<Vec<String>>,
    pub scripts: RefCell<Vec<String>>,
    pub mouse_moves: Cell<usize>,
    pub recreated: Cell<usize>,
}

impl StubPage {
    pub(crate) fn serving(url: &str, snapshots: &[&str]) -> Self {
        let mut page = StubPage::default();
        page.add_document(url, snapshots);
        page
    }

    pub(crate) fn add_document(&mut self, url: &str, snapshots: &[&str]) {
        self.documents.insert(
            url.to_string(),
            snapshots.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub(crate) fn visits(&self) -> Vec<String> {
        self.visits.borrow().clone()
    }

    pub(crate) fn scripts(&self) -> Vec<String> {
        self.scripts.borrow().clone()
    }

    pub(crate) fn scroll_count(&self) -> usize {
        self.scripts
            .borrow()
            .iter()
            .filter(|s| s.starts_with("window.scrollBy"))
            .count()
    }

    pub(crate) fn mouse_moves(&self) -> usize {
        self.mouse_moves.get()
    }

    pub(crate) fn recreated(&self) -> usize {
        self.recreated.get()
    }
}

impl BrowserPage for StubPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), PageError> {
        self.visits.borrow_mut().push(url.to_string());
        let scripted = self.goto_script.borrow_mut().pop_front();
        let failure = match scripted {
            Some(outcome) => outcome,
            None => self.goto_failure,
        };
        if let Some(mode) = failure {
            return Err(mode.error());
        }
        *self.current.borrow_mut() = url.to_string();
        self.scrolls.set(0);
        Ok(())
    }

    async fn content(&self) -> Result<String, PageError> {
        if self
            .content_failure_after_scrolls
            .is_some_and(|after| self.scrolls.get() >= after)
        {
            return Err(FailMode::Closed.error());
        }
        let current = self.current.borrow();
        let html = self
            .documents
            .get(current.as_str())
            .and_then(|snapshots| {
                let index = self.scrolls.get().min(snapshots.len().saturating_sub(1));
                snapshots.get(index).cloned()
            })
            .unwrap_or_else(|| "<html><body></body></html>".to_string());
        Ok(html)
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, PageError> {
        if let Some(mode) = self.script_failure {
            return Err(mode.error());
        }
        self.scripts.borrow_mut().push(script.to_string());
        if script.starts_with("window.scrollBy") {
            self.scrolls.set(self.scrolls.get() + 1);
            return Ok(serde_json::Value::Null);
        }
        Ok(self.script_result.clone().unwrap_or(serde_json::Value::Null))
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<(), PageError> {
        if self.present_selectors.iter().any(|s| s == selector) {
            Ok(())
        } else {
            Err(PageError::SelectorNotFound(selector.to_string()))
        }
    }

    async fn move_mouse(&self, _x: f64, _y: f64) -> Result<(), PageError> {
        self.mouse_moves.set(self.mouse_moves.get() + 1);
        Ok(())
    }

    async fn recreate(&mut self) -> Result<(), PageError> {
        self.recreated.set(self.recreated.get() + 1);
        match self.recreate_failure {
            Some(mode) => Err(mode.error()),
            None => Ok(()),
        }
    }

    async fn close(self) -> Result<(), PageError> {
        self.closed.set(self.closed.get() + 1);
        Ok(())
    }
}

/// Hands out a single prepared [`StubPage`], or fails to open.
pub(crate) struct StubLauncher {
    page: RefCell<Option<StubPage>>,
    pub identities: RefCell<Vec<Identity>>,
}

impl StubLauncher {
    pub(crate) fn with_page(page: StubPage) -> Self {
        Self {
            page: RefCell::new(Some(page)),
            identities: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            page: RefCell::new(None),
            identities: RefCell::new(Vec::new()),
        }
    }
}

impl SessionFactory for StubLauncher {
    type Page = StubPage;

    async fn open(&self, identity: &Identity) -> Result<StubPage, PageError> {
        self.identities.borrow_mut().push(identity.clone());
        self.page
            .borrow_mut()
            .take()
            .ok_or_else(|| PageError::Launch("no browser available".to_string()))
    }
}
