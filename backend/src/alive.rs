//! Process store and the liveness report built from it.

use chrono::{DateTime, Local};
use dashmap::DashMap;
use serde_json::{json, Map, Value};

use crate::models::ServiceMetadata;

#[derive(Debug, Clone, PartialEq)]
pub struct StoreEntry {
    pub updated: DateTime<Local>,
    pub metadata: Value,
}

/// Named objects the process currently holds (the active model, for one).
#[derive(Debug, Default)]
pub struct ProcessStore {
    entries: DashMap<String, StoreEntry>,
}

impl ProcessStore {
    pub fn insert(&self, name: impl Into<String>, metadata: Value) {
        self.entries.insert(
            name.into(),
            StoreEntry {
                updated: Local::now(),
                metadata,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<StoreEntry> {
        self.entries.get(name).map(|entry| entry.value().clone())
    }
}

/// Liveness body and status: 503 when a required entry is missing.
pub fn report(store: &ProcessStore, required: &[String], service: &ServiceMetadata) -> (Value, u16) {
    let mut body = Map::new();
    body.insert("service_metadata".into(), Value::Object(service.clone()));
    body.insert("version".into(), json!(env!("CARGO_PKG_VERSION")));

    let mut status = 200;
    for name in required {
        let entry = match store.get(name) {
            Some(entry) => json!({
                "updated": entry.updated.to_rfc3339(),
                "metadata": entry.metadata,
            }),
            None => {
                status = 503;
                json!("N/A")
            }
        };
        body.insert(name.clone(), entry);
    }
    (Value::Object(body), status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn empty_requirements_are_alive() {
        let mut service = ServiceMetadata::new();
        service.insert("hello".into(), json!("world"));
        let (body, status) = report(&ProcessStore::default(), &[], &service);
        assert_eq!(status, 200);
        assert_eq!(body["service_metadata"], json!({"hello": "world"}));
        assert_eq!(body["version"], json!(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn filled_process_state_reports_entries() {
        let store = ProcessStore::default();
        let before = Local::now();
        store.insert("model", json!({"hello": "is it me"}));
        store.insert("data", json!({"bye": "not you"}));
        let after = Local::now();

        let (body, status) = report(&store, &required(&["model", "data"]), &ServiceMetadata::new());
        assert_eq!(status, 200);
        assert_eq!(body["model"]["metadata"], json!({"hello": "is it me"}));
        assert_eq!(body["data"]["metadata"], json!({"bye": "not you"}));

        let updated = DateTime::parse_from_rfc3339(body["model"]["updated"].as_str().unwrap())
            .unwrap()
            .with_timezone(&Local);
        assert!(before <= updated && updated <= after);
    }

    #[test]
    fn missing_process_state_is_unavailable() {
        let store = ProcessStore::default();
        store.insert("model", json!({"hello": "is it me"}));

        let (body, status) = report(&store, &required(&["model", "data"]), &ServiceMetadata::new());
        assert_eq!(status, 503);
        assert_eq!(body["model"]["metadata"], json!({"hello": "is it me"}));
        assert_eq!(body["data"], json!("N/A"));
    }
}
