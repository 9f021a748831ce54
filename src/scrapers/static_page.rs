use crate::error::CrawlError;
use crate::scrapers::traits::{PageSession, StageResult};
use crate::scrapers::types::{Condition, NodeRef};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Read-only session over fixed markup, e.g. a saved debug dump.
///
/// The document never changes, so waits resolve immediately and anything
/// that needs a live page (scripts, form changes) fails as a stage error.
pub struct StaticPage {
    html: Html,
}

impl StaticPage {
    pub fn from_markup(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let markup = std::fs::read_to_string(path)?;
        Ok(Self::from_markup(&markup))
    }

    // Elements are addressed by their position in document order
    fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html.root_element().descendants().filter_map(ElementRef::wrap)
    }

    fn element(&self, node: NodeRef) -> Option<ElementRef<'_>> {
        self.elements().nth(node.0 as usize)
    }

    fn first_match(&self, selector: &str) -> StageResult<Option<ElementRef<'_>>> {
        let selector = parse_selector(selector)?;
        Ok(self.html.select(&selector).next())
    }
}

fn parse_selector(raw: &str) -> StageResult<Selector> {
    Selector::parse(raw).map_err(|_| CrawlError::InvalidSelector(raw.to_string()))
}

/// Text nodes trimmed and joined line by line, close to what `innerText` shows
fn visible_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

impl PageSession for StaticPage {
    fn navigate(&mut self, url: &str) -> StageResult<()> {
        debug!("Static page ignores navigation to {}", url);
        Ok(())
    }

    fn probe(&self, condition: &Condition) -> StageResult<bool> {
        match condition {
            Condition::Present(selector) => Ok(self.first_match(selector)?.is_some()),
            Condition::Clickable(selector) => Ok(self
                .first_match(selector)?
                .map_or(false, |el| el.value().attr("disabled").is_none())),
            Condition::Stale(node) => Ok(self.element(*node).is_none()),
        }
    }

    fn wait_for(&self, condition: &Condition, _timeout: Duration) -> StageResult<bool> {
        self.probe(condition)
    }

    fn find_all(&self, selector: &str) -> StageResult<Vec<NodeRef>> {
        let selector = parse_selector(selector)?;
        Ok(self
            .elements()
            .enumerate()
            .filter(|(_, el)| selector.matches(el))
            .map(|(idx, _)| NodeRef(idx as u32))
            .collect())
    }

    fn find_within(&self, node: NodeRef, selector: &str) -> StageResult<Vec<NodeRef>> {
        let selector = parse_selector(selector)?;
        let parent = self.element(node).ok_or(CrawlError::Missing("element"))?;
        Ok(self
            .elements()
            .enumerate()
            .skip(node.0 as usize + 1)
            .filter(|(_, el)| el.ancestors().any(|a| a.id() == parent.id()))
            .filter(|(_, el)| selector.matches(el))
            .map(|(idx, _)| NodeRef(idx as u32))
            .collect())
    }

    fn read_text(&self, node: NodeRef) -> StageResult<String> {
        self.element(node)
            .map(|el| visible_text(&el))
            .ok_or(CrawlError::Missing("element"))
    }

    fn read_attribute(&self, node: NodeRef, name: &str) -> StageResult<Option<String>> {
        let element = self.element(node).ok_or(CrawlError::Missing("element"))?;
        Ok(element.value().attr(name).map(str::to_string))
    }

    fn select_option(&self, _node: NodeRef, _label: &str) -> StageResult<()> {
        Err(CrawlError::Unsupported("form selection"))
    }

    fn execute_script(&self, _expression: &str) -> StageResult<Value> {
        Err(CrawlError::Unsupported("script execution"))
    }

    fn page_markup(&self) -> StageResult<String> {
        Ok(self.html.html())
    }

    fn close(&mut self) -> StageResult<()> {
        Ok(())
    }
}
