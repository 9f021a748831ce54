use crate::models::{Item, Snapshot};
use crate::notify::{notify_city, MessageSink};
use crate::state::StateStore;
use crate::tracker::reconcile;
use chrono::Utc;
use tracing::{info, warn};

/// What one run did, for logging and tests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub cities_with_items: usize,
    pub new_items: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub saved: bool,
}

/// Diff the crawled `items` against `prior`, announce new items per city
/// and persist the merged snapshot when any city matched anything.
pub async fn process_items(
    prior: &Snapshot,
    items: &[Item],
    cities: &[String],
    sink: &dyn MessageSink,
    store: &StateStore,
) -> RunSummary {
    let timestamp = Utc::now().to_rfc3339();
    let outcome = reconcile(prior, items, cities, &timestamp);
    let mut summary = RunSummary {
        cities_with_items: outcome.diffs.len(),
        ..Default::default()
    };

    for diff in &outcome.diffs {
        info!(
            "{}: {} items, {} new",
            diff.city,
            diff.current.len(),
            diff.new_items.len()
        );
        if diff.new_items.is_empty() {
            continue;
        }

        summary.new_items += diff.new_items.len();
        if notify_city(sink, &diff.city, &diff.new_items).await {
            summary.notifications_sent += 1;
        } else {
            summary.notifications_failed += 1;
        }
    }

    if !outcome.any_new() {
        info!("No new items found");
    }

    if outcome.any_items() {
        match store.save(&outcome.snapshot).await {
            Ok(()) => summary.saved = true,
            Err(err) => warn!("Could not save results: {}", err),
        }
    } else {
        info!("No city matched any item, keeping previous results");
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CityState;
    use crate::notify::tests::CapturingSink;
    use crate::notify::UnavailableSink;

    fn cities(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn first_run_announces_everything_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("previous_results.json"));
        let sink = CapturingSink::default();
        let items = vec![
            Item::new("b1", "Berlin one"),
            Item::new("h1", "Hamburg one"),
            Item::new("b2", "Berlin two"),
        ];

        let prior = store.load().await;
        let summary = process_items(&prior, &items, &cities(&["Berlin", "Hamburg"]), &sink, &store).await;

        assert_eq!(summary.cities_with_items, 2);
        assert_eq!(summary.new_items, 3);
        assert_eq!(summary.notifications_sent, 2);
        assert!(summary.saved);

        let messages = sink.messages.lock().unwrap();
        assert!(messages[0].starts_with("<b>New items in Berlin: 2</b>"));
        assert!(messages[1].starts_with("<b>New items in Hamburg: 1</b>"));

        let saved = store.load().await;
        assert_eq!(saved["Berlin"].results.len(), 2);
        assert_eq!(saved["Hamburg"].results.len(), 1);
    }

    #[tokio::test]
    async fn unchanged_page_sends_nothing_but_refreshes_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("previous_results.json"));
        let items = vec![Item::new("b1", "Berlin one")];
        let berlin = cities(&["Berlin"]);

        process_items(&Snapshot::new(), &items, &berlin, &CapturingSink::default(), &store).await;
        let prior = store.load().await;

        let sink = CapturingSink::default();
        let summary = process_items(&prior, &items, &berlin, &sink, &store).await;

        assert_eq!(summary.new_items, 0);
        assert!(summary.saved);
        assert!(sink.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_crawl_leaves_file_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("previous_results.json");
        let original = "{\n    \"Berlin\": {\"timestamp\": \"2024-01-01T00:00:00\", \"results\": []}\n}";
        std::fs::write(&path, original).unwrap();
        let store = StateStore::new(&path);

        let prior = store.load().await;
        let summary = process_items(&prior, &[], &cities(&["Berlin"]), &CapturingSink::default(), &store).await;

        assert!(!summary.saved);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }

    #[tokio::test]
    async fn entry_without_timestamp_keeps_known_items_and_other_cities() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("previous_results.json");
        std::fs::write(
            &path,
            r#"{
                "CityA": {"results": [{"id": "u1", "full_text": "CityA one"}]},
                "CityB": {"timestamp": "t0", "results": [{"id": "b1", "full_text": "CityB one"}]}
            }"#,
        )
        .unwrap();
        let store = StateStore::new(&path);
        let sink = CapturingSink::default();
        let items = vec![Item::new("u1", "CityA one"), Item::new("u2", "CityA two")];

        let prior = store.load().await;
        assert_eq!(prior.len(), 2);
        let summary = process_items(&prior, &items, &cities(&["CityA", "CityB"]), &sink, &store).await;

        assert_eq!(summary.new_items, 1);
        assert!(sink.messages.lock().unwrap()[0].starts_with("<b>New items in CityA: 1</b>"));

        let saved = store.load().await;
        assert_eq!(saved["CityA"].results, items);
        assert!(!saved["CityA"].timestamp.is_empty());
        assert_eq!(saved["CityB"], prior["CityB"]);
    }

    #[tokio::test]
    async fn failed_delivery_does_not_block_saving() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("previous_results.json"));
        let sink = CapturingSink {
            fail: true,
            ..Default::default()
        };
        let mut prior = Snapshot::new();
        prior.insert(
            "Hamburg".to_string(),
            CityState {
                timestamp: "t0".to_string(),
                results: vec![Item::new("h0", "Hamburg old")],
            },
        );

        let summary = process_items(
            &prior,
            &[Item::new("b1", "Berlin one")],
            &cities(&["Berlin", "Hamburg"]),
            &sink,
            &store,
        )
        .await;

        assert_eq!(summary.notifications_failed, 1);
        assert!(summary.saved);

        let saved = store.load().await;
        assert_eq!(saved["Hamburg"], prior["Hamburg"]);
        assert_eq!(saved["Berlin"].results[0].identity, "b1");
    }

    #[tokio::test]
    async fn unavailable_notifier_still_saves() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("previous_results.json"));
        let sink = UnavailableSink {
            reason: "client setup failed".to_string(),
        };

        let summary = process_items(
            &Snapshot::new(),
            &[Item::new("b1", "Berlin one")],
            &cities(&["Berlin"]),
            &sink,
            &store,
        )
        .await;

        assert_eq!(summary.notifications_failed, 1);
        assert!(summary.saved);
        assert_eq!(store.load().await["Berlin"].results[0].identity, "b1");
    }
}
