use crate::error::StateError;
use crate::models::{CityState, Snapshot};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// JSON file holding the snapshot between runs
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Previous snapshot, or an empty one when the file is absent or unreadable
    pub async fn load(&self) -> Snapshot {
        match self.try_load().await {
            Ok(Some(snapshot)) => {
                info!("Loaded previous results for {} cities", snapshot.len());
                snapshot
            }
            Ok(None) => {
                info!("No previous results at {}, starting fresh", self.path.display());
                Snapshot::new()
            }
            Err(err) => {
                warn!("Ignoring previous results: {}", err);
                Snapshot::new()
            }
        }
    }

    async fn try_load(&self) -> Result<Option<Snapshot>, StateError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StateError::Read(err)),
        };
        let entries: BTreeMap<String, Value> = serde_json::from_str(&raw).map_err(StateError::Parse)?;
        Ok(Some(parse_cities(entries)))
    }

    /// Overwrite the file with `snapshot`
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), StateError> {
        let json = to_pretty_json(snapshot)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(StateError::Write)?;
        debug!("Saved results for {} cities to {}", snapshot.len(), self.path.display());
        Ok(())
    }
}

/// One malformed city entry is dropped on its own; the others still load
fn parse_cities(entries: BTreeMap<String, Value>) -> Snapshot {
    entries
        .into_iter()
        .filter_map(|(city, value)| match serde_json::from_value::<CityState>(value) {
            Ok(state) => Some((city, state)),
            Err(err) => {
                warn!("Skipping unreadable previous results for {}: {}", city, err);
                None
            }
        })
        .collect()
}

fn to_pretty_json(snapshot: &Snapshot) -> Result<Vec<u8>, StateError> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    snapshot
        .serialize(&mut serializer)
        .map_err(StateError::Serialize)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CityState, Item};

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "Köln".to_string(),
            CityState {
                timestamp: "2024-05-01T10:00:00+00:00".to_string(),
                results: vec![Item::new("https://x.org/k/1", "Köln Süd\nBook now!")],
            },
        );
        snapshot
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("previous_results.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("previous_results.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(StateStore::new(&path).load().await.is_empty());
    }

    #[tokio::test]
    async fn entry_without_timestamp_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("previous_results.json");
        std::fs::write(
            &path,
            r#"{"CityA": {"results": [{"id": "u1", "full_text": "CityA one"}]}}"#,
        )
        .unwrap();

        let snapshot = StateStore::new(&path).load().await;

        assert_eq!(snapshot["CityA"].results[0].identity, "u1");
        assert_eq!(snapshot["CityA"].timestamp, "");
    }

    #[tokio::test]
    async fn malformed_city_entry_does_not_drop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("previous_results.json");
        std::fs::write(
            &path,
            r#"{
                "Berlin": {"timestamp": "t0", "results": "not a list"},
                "Hamburg": {"timestamp": "t0", "results": [{"id": "h1", "full_text": "Hamburg"}]},
                "Bremen": 42
            }"#,
        )
        .unwrap();

        let snapshot = StateStore::new(&path).load().await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["Hamburg"].results[0].identity, "h1");
    }

    #[tokio::test]
    async fn non_object_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("previous_results.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(StateStore::new(&path).load().await.is_empty());
    }

    #[tokio::test]
    async fn saved_snapshot_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("previous_results.json"));

        store.save(&sample()).await.unwrap();

        assert_eq!(store.load().await, sample());
    }

    #[tokio::test]
    async fn file_uses_persisted_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("previous_results.json");
        StateStore::new(&path).save(&sample()).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n    \"Köln\": {"));
        assert!(raw.contains("\"full_text\": \"Köln Süd\\nBook now!\\n Link: https://x.org/k/1\""));

        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["Köln"]["results"][0]["id"], "https://x.org/k/1");
        assert_eq!(value["Köln"]["timestamp"], "2024-05-01T10:00:00+00:00");
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("missing").join("state.json"));

        assert!(matches!(store.save(&sample()).await, Err(StateError::Write(_))));
    }
}
