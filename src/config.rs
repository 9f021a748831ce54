use crate::error::ConfigError;
use std::path::PathBuf;

pub const DEFAULT_STATE_FILE: &str = "previous_results.json";
pub const DEFAULT_DEBUG_HTML: &str = "debug.html";

/// Exit code used when required configuration is missing
pub const EXIT_MISSING_CONFIG: i32 = 1;

/// Run configuration, built once at startup and handed to each component
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub chat_id: String,
    pub target_url: String,
    pub cities: Vec<String>,
    pub state_file: PathBuf,
    pub debug_html: PathBuf,
    pub headless: bool,
    /// Saved page markup to crawl instead of launching a browser
    pub replay_html: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let required = ["TELEGRAM_BOT_TOKEN", "TELEGRAM_CHAT_ID", "TARGET_URL", "TARGET_CITY"];
        let missing: Vec<&'static str> = required
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let value = |key: &str| get(key).unwrap_or_default();

        Ok(Self {
            bot_token: value("TELEGRAM_BOT_TOKEN"),
            chat_id: value("TELEGRAM_CHAT_ID"),
            target_url: value("TARGET_URL"),
            cities: parse_cities(&value("TARGET_CITY")),
            state_file: get("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            debug_html: get("DEBUG_HTML_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEBUG_HTML)),
            headless: get("HEADLESS").map_or(true, |raw| parse_flag(&raw)),
            replay_html: get("REPLAY_HTML").map(PathBuf::from),
        })
    }
}

/// Split a comma separated city list, trimming entries and dropping empties
pub fn parse_cities(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|city| !city.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
