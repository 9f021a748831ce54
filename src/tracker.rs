//! Per-city change detection against the previous snapshot.

use crate::models::{CityState, Item, Snapshot};
use std::collections::HashSet;

/// Result of comparing one city's current items with its prior state
#[derive(Debug, Clone, PartialEq)]
pub struct CityDiff {
    pub city: String,
    pub current: Vec<Item>,
    pub new_items: Vec<Item>,
}

/// Outcome of reconciling a whole crawl with the prior snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Prior snapshot with every city that had items this run replaced
    pub snapshot: Snapshot,
    /// Cities that had at least one item this run, in configured order
    pub diffs: Vec<CityDiff>,
}

impl Reconciliation {
    /// Some city matched at least one item; the snapshot is worth saving
    pub fn any_items(&self) -> bool {
        !self.diffs.is_empty()
    }

    pub fn any_new(&self) -> bool {
        self.diffs.iter().any(|diff| !diff.new_items.is_empty())
    }
}

/// Items whose text mentions `city`, ignoring case. An item may match several cities.
pub fn items_for_city(items: &[Item], city: &str) -> Vec<Item> {
    let needle = city.to_lowercase();
    items
        .iter()
        .filter(|item| item.display_text.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Current items whose identity the previous state did not contain, in current order.
/// Without previous state every current item is new.
pub fn find_new_items(current: &[Item], previous: Option<&CityState>) -> Vec<Item> {
    let Some(previous) = previous else {
        return current.to_vec();
    };

    let seen: HashSet<&str> = previous
        .results
        .iter()
        .map(|item| item.identity.as_str())
        .collect();

    current
        .iter()
        .filter(|item| !seen.contains(item.identity.as_str()))
        .cloned()
        .collect()
}

/// Partition `items` by city, diff each city against `prior`, and build the
/// next snapshot. Cities without items keep their previous entry untouched.
pub fn reconcile(prior: &Snapshot, items: &[Item], cities: &[String], timestamp: &str) -> Reconciliation {
    let mut snapshot = prior.clone();
    let mut diffs = Vec::new();

    for city in cities {
        let current = items_for_city(items, city);
        if current.is_empty() {
            continue;
        }

        let new_items = find_new_items(&current, prior.get(city));
        snapshot.insert(
            city.clone(),
            CityState {
                timestamp: timestamp.to_string(),
                results: current.clone(),
            },
        );
        diffs.push(CityDiff {
            city: city.clone(),
            current,
            new_items,
        });
    }

    Reconciliation { snapshot, diffs }
}
