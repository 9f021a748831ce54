use crate::error::CrawlError;
use crate::scrapers::types::{Condition, NodeRef};
use std::thread;
use std::time::{Duration, Instant};

pub type StageResult<T> = Result<T, CrawlError>;

/// How often `wait_for` re-probes a condition
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Narrow capability over a browser tab.
/// The crawl protocol only talks to this, never to a concrete engine.
pub trait PageSession {
    fn navigate(&mut self, url: &str) -> StageResult<()>;

    /// Check a condition once, without waiting
    fn probe(&self, condition: &Condition) -> StageResult<bool>;

    /// Poll `condition` until it holds or `timeout` elapses.
    ///
    /// Returns `Ok(false)` on timeout; errors are reserved for a broken session.
    fn wait_for(&self, condition: &Condition, timeout: Duration) -> StageResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.probe(condition)? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// All elements matching a CSS selector, in document order
    fn find_all(&self, selector: &str) -> StageResult<Vec<NodeRef>>;

    /// Descendants of `node` matching a CSS selector
    fn find_within(&self, node: NodeRef, selector: &str) -> StageResult<Vec<NodeRef>>;

    /// Rendered text of an element
    fn read_text(&self, node: NodeRef) -> StageResult<String>;

    fn read_attribute(&self, node: NodeRef, name: &str) -> StageResult<Option<String>>;

    /// Pick the option with the given visible label in a selection control
    fn select_option(&self, node: NodeRef, label: &str) -> StageResult<()>;

    fn execute_script(&self, expression: &str) -> StageResult<serde_json::Value>;

    /// Full rendered markup of the current document
    fn page_markup(&self) -> StageResult<String>;

    fn close(&mut self) -> StageResult<()>;
}
