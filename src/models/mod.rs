use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A bookable listing card as it appeared on the page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Booking link of the card, or a random placeholder when none was found
    #[serde(rename = "id")]
    pub identity: String,
    /// Card text followed by the resolved link, only used for rendering
    #[serde(rename = "full_text")]
    pub display_text: String,
}

impl Item {
    pub fn new(identity: impl Into<String>, card_text: &str) -> Self {
        let identity = identity.into();
        let display_text = format!("{}\n Link: {}", card_text, identity);
        Self {
            identity,
            display_text,
        }
    }
}

/// Last successful crawl result for one city
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CityState {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub results: Vec<Item>,
}

/// Everything persisted between runs, keyed by city name as configured
pub type Snapshot = BTreeMap<String, CityState>;
