use std::time::Duration;

/// Opaque handle to an element inside a page session.
///
/// Only meaningful to the session that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(pub u32);

/// Page condition that a session can probe or wait for
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// At least one element matches the selector
    Present(String),
    /// The first matching element is visible and enabled
    Clickable(String),
    /// The referenced element has been detached from the document
    Stale(NodeRef),
}

/// CSS selectors and labels describing the listing page
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    /// Element whose presence means the page finished its first render
    pub ready_marker: String,
    /// One listing card
    pub card: String,
    /// Selection control that switches the unlock-key filter
    pub unlock_control: String,
    /// Visible label of the filter option to pick
    pub filter_label: String,
    /// Anchors inside a card that may carry the booking link
    pub link: String,
    /// Text that marks a card as bookable
    pub availability_marker: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            ready_marker: "#city".to_string(),
            card: "div.card.card-style".to_string(),
            unlock_control: "[name=\"unlock_key\"]".to_string(),
            filter_label: "Without code".to_string(),
            link: "a".to_string(),
            availability_marker: "Book now!".to_string(),
        }
    }
}

/// Ceilings for every bounded wait in the crawl
#[derive(Debug, Clone, Copy)]
pub struct WaitTimeouts {
    pub page_ready: Duration,
    pub filter_cards: Duration,
    pub filter_control: Duration,
    pub rerender: Duration,
    pub final_cards: Duration,
}

impl Default for WaitTimeouts {
    fn default() -> Self {
        Self {
            page_ready: Duration::from_secs(30),
            filter_cards: Duration::from_secs(15),
            filter_control: Duration::from_secs(10),
            rerender: Duration::from_secs(30),
            final_cards: Duration::from_secs(15),
        }
    }
}
