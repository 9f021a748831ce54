use crate::error::CrawlError;
use crate::scrapers::traits::{PageSession, StageResult};
use crate::scrapers::types::{Condition, NodeRef};
use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use rand::seq::SliceRandom;
use serde_json::Value;
use std::ffi::{OsStr, OsString};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
];

const WINDOW_SIZES: [(u32, u32); 5] = [
    (1920, 1080),
    (1366, 768),
    (1440, 900),
    (1536, 864),
    (1280, 720),
];

// Human pauses add up to well over a minute; the default idle timeout would
// kill the browser mid-crawl.
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

// Elements handed out by this session are tracked in a page-side registry.
// A navigation or re-render drops the registry or detaches the nodes, which
// is exactly what staleness means.
const REGISTRY: &str = r#"
    const reg = (window.__slotWatch = window.__slotWatch || { seq: 0, nodes: new Map() });
    const track = (el) => {
        if (!el.__slotWatchId) {
            el.__slotWatchId = ++reg.seq;
            reg.nodes.set(el.__slotWatchId, el);
        }
        return el.__slotWatchId;
    };
"#;

/// A single Chrome tab driven over the DevTools protocol
pub struct ChromeSession {
    // Dropping the browser kills the Chrome process, so it lives as long as the tab
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    /// Launch Chrome with a randomly picked desktop user agent and window size
    pub fn launch(headless: bool) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let user_agent = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
        let window_size = WINDOW_SIZES.choose(&mut rng).copied().unwrap_or(WINDOW_SIZES[0]);

        info!(
            "Launching Chrome (headless: {}, window: {}x{})...",
            headless, window_size.0, window_size.1
        );
        debug!("User agent: {}", user_agent);

        let user_agent_arg = OsString::from(format!("--user-agent={}", user_agent));
        let args: Vec<&OsStr> = vec![
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-extensions"),
            user_agent_arg.as_os_str(),
        ];

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .sandbox(false)
            .window_size(Some(window_size))
            .idle_browser_timeout(IDLE_TIMEOUT)
            .args(args)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    fn eval(&self, expression: &str) -> StageResult<Value> {
        let result = self.tab.evaluate(expression, false)?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    /// Run `body` with the element registry in scope; `body` must `return`
    fn eval_tracked(&self, body: &str) -> StageResult<Value> {
        self.eval(&format!("(() => {{ {} {} }})()", REGISTRY, body))
    }

    fn tracked_ids(&self, body: &str) -> StageResult<Vec<NodeRef>> {
        let value = self.eval_tracked(body)?;
        let raw = value.as_str().ok_or_else(|| CrawlError::ScriptResult {
            script: "element lookup".to_string(),
            value: value.to_string(),
        })?;
        let ids: Vec<u32> = serde_json::from_str(raw).map_err(|_| CrawlError::ScriptResult {
            script: "element lookup".to_string(),
            value: raw.to_string(),
        })?;
        Ok(ids.into_iter().map(NodeRef).collect())
    }
}

/// JS string literal for embedding selectors and labels
fn js_str(raw: &str) -> String {
    serde_json::to_string(raw).unwrap_or_else(|_| "\"\"".to_string())
}

impl PageSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> StageResult<()> {
        info!("Opening listing page...");
        self.tab.navigate_to(url)?;
        self.tab.wait_until_navigated()?;
        Ok(())
    }

    fn probe(&self, condition: &Condition) -> StageResult<bool> {
        let body = match condition {
            Condition::Present(selector) => {
                format!("return document.querySelector({}) !== null;", js_str(selector))
            }
            Condition::Clickable(selector) => format!(
                "const el = document.querySelector({});
                 return !!el && !el.disabled && el.getClientRects().length > 0;",
                js_str(selector)
            ),
            Condition::Stale(node) => format!(
                "const el = reg.nodes.get({});
                 return !el || !el.isConnected;",
                node.0
            ),
        };
        Ok(self.eval_tracked(&body)?.as_bool().unwrap_or(false))
    }

    fn find_all(&self, selector: &str) -> StageResult<Vec<NodeRef>> {
        self.tracked_ids(&format!(
            "return JSON.stringify(Array.from(document.querySelectorAll({})).map(track));",
            js_str(selector)
        ))
    }

    fn find_within(&self, node: NodeRef, selector: &str) -> StageResult<Vec<NodeRef>> {
        self.tracked_ids(&format!(
            "const el = reg.nodes.get({});
             if (!el) return JSON.stringify([]);
             return JSON.stringify(Array.from(el.querySelectorAll({})).map(track));",
            node.0,
            js_str(selector)
        ))
    }

    fn read_text(&self, node: NodeRef) -> StageResult<String> {
        let value = self.eval_tracked(&format!(
            "const el = reg.nodes.get({});
             return el && el.isConnected ? el.innerText : null;",
            node.0
        ))?;
        match value {
            Value::String(text) => Ok(text),
            _ => Err(CrawlError::Missing("element text")),
        }
    }

    fn read_attribute(&self, node: NodeRef, name: &str) -> StageResult<Option<String>> {
        // Properties first so links come back resolved, like a user would follow them
        let value = self.eval_tracked(&format!(
            "const el = reg.nodes.get({id});
             if (!el) return null;
             const name = {name};
             const raw = (name in el && typeof el[name] !== 'object') ? el[name] : el.getAttribute(name);
             return raw == null ? null : String(raw);",
            id = node.0,
            name = js_str(name)
        ))?;
        Ok(value.as_str().map(str::to_string))
    }

    fn select_option(&self, node: NodeRef, label: &str) -> StageResult<()> {
        let selected = self.eval_tracked(&format!(
            "const el = reg.nodes.get({id});
             if (!el || !el.options) return false;
             const option = Array.from(el.options).find(o => o.text.trim() === {label});
             if (!option) return false;
             el.focus();
             el.value = option.value;
             option.selected = true;
             el.dispatchEvent(new Event('input', {{ bubbles: true }}));
             el.dispatchEvent(new Event('change', {{ bubbles: true }}));
             return true;",
            id = node.0,
            label = js_str(label)
        ))?;
        if selected.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(CrawlError::Missing("filter option"))
        }
    }

    fn execute_script(&self, expression: &str) -> StageResult<Value> {
        self.eval(expression)
    }

    fn page_markup(&self) -> StageResult<String> {
        Ok(self.tab.get_content()?)
    }

    fn close(&mut self) -> StageResult<()> {
        self.tab.close(true)?;
        info!("Browser session closed");
        Ok(())
    }
}
