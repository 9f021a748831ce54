//! The crawl protocol: load, look around, scroll, switch the unlock-key
//! filter, wait for the re-render, extract, linger, tear down.
//!
//! Each wait has its own ceiling. Only a missing ready marker, a page that
//! never shows a card, or a broken session ends the crawl early; the scroll
//! and filter phases fall back to whatever the page currently shows.

use crate::error::CrawlError;
use crate::models::Item;
use crate::scrapers::extract::extract_items;
use crate::scrapers::humanize::{Humanizer, Pause, ThreadSleep};
use crate::scrapers::traits::{PageSession, StageResult};
use crate::scrapers::types::{Condition, ListingSelectors, WaitTimeouts};
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const PAGE_HEIGHT_JS: &str = "document.body.scrollHeight";
pub const SCROLL_OFFSET_JS: &str = "window.pageYOffset";

/// Drives one browser session through the listing page
pub struct ListingCrawler<P: Pause = ThreadSleep> {
    selectors: ListingSelectors,
    timeouts: WaitTimeouts,
    human: Humanizer<P>,
    debug_html: Option<PathBuf>,
}

impl ListingCrawler<ThreadSleep> {
    pub fn new(debug_html: Option<PathBuf>) -> Self {
        Self::with_parts(
            ListingSelectors::default(),
            WaitTimeouts::default(),
            Humanizer::new(),
            debug_html,
        )
    }
}

impl<P: Pause> ListingCrawler<P> {
    pub fn with_parts(
        selectors: ListingSelectors,
        timeouts: WaitTimeouts,
        human: Humanizer<P>,
        debug_html: Option<PathBuf>,
    ) -> Self {
        Self {
            selectors,
            timeouts,
            human,
            debug_html,
        }
    }

    #[cfg(test)]
    pub fn humanizer(&self) -> &Humanizer<P> {
        &self.human
    }

    /// Crawl `url` with `page` and return the bookable items, or nothing.
    ///
    /// Never fails; the session is always torn down before returning.
    pub fn crawl<S: PageSession>(&mut self, mut page: S, url: &str) -> Vec<Item> {
        let outcome = self.drive(&mut page, url);
        self.teardown(&mut page);

        match outcome {
            Ok(items) => items,
            Err(err) => {
                warn!("Crawl aborted: {}", err);
                Vec::new()
            }
        }
    }

    fn drive<S: PageSession>(&mut self, page: &mut S, url: &str) -> StageResult<Vec<Item>> {
        self.load(page, url)?;

        // Look at the page for a moment, sometimes
        if self.human.chance(0.4) {
            self.human.delay(1.0, 3.0);
        }

        if let Err(err) = self.browse(&*page) {
            warn!("Scroll phase abandoned: {}", err);
        }

        match self.apply_filter(&*page) {
            Ok(()) => info!("Filter applied, page re-rendered"),
            Err(err) => warn!("Filter not applied, using unfiltered cards: {}", err),
        }

        let card = Condition::Present(self.selectors.card.clone());
        if !page.wait_for(&card, self.timeouts.final_cards)? {
            return Err(CrawlError::timeout("listing cards", self.timeouts.final_cards));
        }

        // The cards can vanish between the wait and the lookup
        let cards = page.find_all(&self.selectors.card).unwrap_or_else(|err| {
            warn!("Card lookup failed: {}", err);
            Vec::new()
        });
        info!("Found {} cards on page", cards.len());

        let items = extract_items(&*page, &cards, &self.selectors, &mut self.human);

        self.human.delay(3.0, 8.0);
        Ok(items)
    }

    fn load<S: PageSession>(&mut self, page: &mut S, url: &str) -> StageResult<()> {
        page.navigate(url)?;

        let ready = Condition::Present(self.selectors.ready_marker.clone());
        if !page.wait_for(&ready, self.timeouts.page_ready)? {
            return Err(CrawlError::timeout("page ready marker", self.timeouts.page_ready));
        }
        debug!("Page ready");
        Ok(())
    }

    /// Scroll down in a few jittered hops, then usually back to the top
    fn browse<S: PageSession>(&mut self, page: &S) -> StageResult<()> {
        let height = script_number(page, PAGE_HEIGHT_JS)?;
        let steps = self.human.between(2, 5);
        let mut baseline = page.find_all(&self.selectors.card)?.len();
        let mut fraction: f64 = 0.1;

        for step in 0..steps {
            let jittered = ((step + 1) as f64 / steps as f64 + self.human.jitter(0.1)).clamp(0.1, 0.9);
            // Never scroll back up while reading down the page
            fraction = fraction.max(jittered);

            let current = script_number(page, SCROLL_OFFSET_JS)?;
            self.human.smooth_scroll(page, current, (height * fraction).round())?;

            if self.human.chance(0.7) {
                self.human.delay(1.0, 3.5);
            } else {
                self.human.delay(0.5, 1.0);
            }

            baseline = baseline.max(page.find_all(&self.selectors.card)?.len());
        }
        debug!("Scrolled {} steps, {} cards seen", steps, baseline);

        if self.human.chance(0.8) {
            let current = script_number(page, SCROLL_OFFSET_JS)?;
            self.human.smooth_scroll(page, current, 0.0)?;
            self.human.delay(1.5, 3.0);
        } else {
            self.human.delay(1.0, 2.0);
        }
        Ok(())
    }

    /// Pick "Without code" in the unlock-key control and wait for the cards to re-render
    fn apply_filter<S: PageSession>(&mut self, page: &S) -> StageResult<()> {
        let card = Condition::Present(self.selectors.card.clone());
        if !page.wait_for(&card, self.timeouts.filter_cards)? {
            return Err(CrawlError::timeout("cards before filtering", self.timeouts.filter_cards));
        }
        let old_card = page
            .find_all(&self.selectors.card)?
            .first()
            .copied()
            .ok_or(CrawlError::Missing("listing card"))?;

        let control = Condition::Clickable(self.selectors.unlock_control.clone());
        if !page.wait_for(&control, self.timeouts.filter_control)? {
            return Err(CrawlError::timeout("unlock key control", self.timeouts.filter_control));
        }
        let control = page
            .find_all(&self.selectors.unlock_control)?
            .first()
            .copied()
            .ok_or(CrawlError::Missing("unlock key control"))?;

        if self.human.chance(0.6) {
            self.human.delay(0.5, 1.5);
        }

        page.select_option(control, &self.selectors.filter_label)?;
        self.human.delay(0.8, 2.0);

        if !page.wait_for(&Condition::Stale(old_card), self.timeouts.rerender)? {
            return Err(CrawlError::timeout("filtered results", self.timeouts.rerender));
        }
        Ok(())
    }

    fn teardown<S: PageSession>(&self, page: &mut S) {
        if let Some(path) = &self.debug_html {
            match page.page_markup() {
                Ok(markup) => match std::fs::write(path, &markup) {
                    Ok(()) => debug!("Saved page HTML to {} ({} bytes)", path.display(), markup.len()),
                    Err(err) => debug!("Could not write {}: {}", path.display(), err),
                },
                Err(err) => debug!("Could not capture page HTML: {}", err),
            }
        }

        if let Err(err) = page.close() {
            warn!("Failed to close browser session: {}", err);
        }
    }
}

fn script_number<S: PageSession>(page: &S, expression: &str) -> StageResult<f64> {
    let value = page.execute_script(expression)?;
    value.as_f64().ok_or_else(|| CrawlError::ScriptResult {
        script: expression.to_string(),
        value: value.to_string(),
    })
}
