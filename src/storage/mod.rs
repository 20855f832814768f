//! Durable local storage for study state.
//!
//! The engine only requires an opaque key-value string store
//! ([`KeyValueStore`]); the consuming app supplies whatever backs it
//! (a platform store, a file, localStorage behind a bridge).
//! [`StudyStateStore`] layers the persisted-schema handling on top: every
//! load runs the migration check before anything else reads the data, and
//! a repaired blob is written back immediately.

pub mod migrate;
pub mod schema;

pub use migrate::{migrate_last_review_date, needs_migration};
pub use schema::{MigrationOutcome, PersistedBlob, Schema, StoredState, SCHEMA_VERSION};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Storage key the study state is persisted under.
pub const STUDY_STATE_KEY: &str = "lashon_study_state";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal durable key-value contract the engine needs.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// In-memory store for tests and composition roots without a platform
/// store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Outcome of loading the persisted study state.
#[derive(Debug)]
pub struct LoadOutcome {
    pub state: StoredState,
    /// The blob was legacy or corrupt and has been rewritten.
    pub migrated: bool,
    /// What the sanitizers repaired, if anything.
    pub notes: Vec<String>,
}

/// Repository for the single persisted study-state blob.
pub struct StudyStateStore<S: KeyValueStore> {
    store: Arc<S>,
    key: String,
}

impl<S: KeyValueStore> StudyStateStore<S> {
    pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Load the study state, migrating and repairing first if needed.
    ///
    /// Missing or unparseable data degrades to the default state; invalid
    /// records inside an otherwise readable blob are repaired in place and
    /// the repaired blob is written back before this returns.
    pub fn load(&self) -> StoreResult<LoadOutcome> {
        let Some(text) = self.store.get(&self.key)? else {
            return Ok(LoadOutcome {
                state: StoredState::default(),
                migrated: false,
                notes: Vec::new(),
            });
        };

        let raw: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stored study state is not valid JSON; starting fresh");
                return Ok(LoadOutcome {
                    state: StoredState::default(),
                    migrated: false,
                    notes: vec!["blob unparseable; replaced with defaults".to_string()],
                });
            }
        };

        let outcome = Schema::detect(raw).into_current();
        if outcome.write_back {
            info!(
                repairs = outcome.notes.len(),
                "persisted study state migrated; writing back"
            );
            self.save(&outcome.state)?;
        }

        Ok(LoadOutcome {
            state: outcome.state,
            migrated: outcome.write_back,
            notes: outcome.notes,
        })
    }

    /// Persist the state under the current schema version.
    pub fn save(&self, state: &StoredState) -> StoreResult<()> {
        let text = serde_json::to_string(&PersistedBlob::current(state.clone()))?;
        self.store.set(&self.key, &text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_memory_store_get_set() {
        let s = MemoryStore::new();
        assert!(s.get("missing").unwrap().is_none());
        s.set("key", "value").unwrap();
        assert_eq!(s.get("key").unwrap().as_deref(), Some("value"));
        s.set("key", "updated").unwrap();
        assert_eq!(s.get("key").unwrap().as_deref(), Some("updated"));
    }

    #[test]
    fn test_load_missing_blob_yields_defaults() {
        let repo = StudyStateStore::new(store(), STUDY_STATE_KEY);
        let loaded = repo.load().unwrap();
        assert!(!loaded.migrated);
        assert_eq!(loaded.state, StoredState::default());
    }

    #[test]
    fn test_load_garbage_yields_defaults() {
        let s = store();
        s.set(STUDY_STATE_KEY, "{{{not json").unwrap();

        let repo = StudyStateStore::new(Arc::clone(&s), STUDY_STATE_KEY);
        let loaded = repo.load().unwrap();
        assert_eq!(loaded.state, StoredState::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let s = store();
        let repo = StudyStateStore::new(Arc::clone(&s), STUDY_STATE_KEY);

        let mut state = StoredState::default();
        state.last_review_date = Some("2024-01-15".to_string());
        state.stats.xp = 230;
        state.stats.level = 2;
        repo.save(&state).unwrap();

        let loaded = repo.load().unwrap();
        assert!(!loaded.migrated);
        assert_eq!(loaded.state, state);
    }

    #[test]
    fn test_legacy_blob_is_repaired_and_written_back() {
        let s = store();
        let legacy = json!({
            "state": {
                "lastReviewDate": "Mon Jan 15 2024",
                "progress": {
                    "word1": {
                        "wordId": "word1",
                        "easeFactor": 0.5,
                        "interval": 5,
                        "repetitions": 2,
                        "maxRepetitions": 2,
                        "nextReview": "2024-01-16T00:00:00Z",
                        "lastReview": null,
                        "lastQuality": 4,
                        "timesReviewed": 5,
                        "timesCorrect": 3
                    }
                }
            }
        });
        s.set(STUDY_STATE_KEY, &legacy.to_string()).unwrap();

        let repo = StudyStateStore::new(Arc::clone(&s), STUDY_STATE_KEY);
        let loaded = repo.load().unwrap();

        assert!(loaded.migrated);
        assert_eq!(loaded.state.last_review_date.as_deref(), Some("2024-01-15"));
        assert_eq!(loaded.state.progress["word1"].ease_factor, 1.3);

        // the rewritten blob is versioned and loads clean the second time
        let text = s.get(STUDY_STATE_KEY).unwrap().unwrap();
        let raw: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw["schemaVersion"], json!(SCHEMA_VERSION));

        let second = repo.load().unwrap();
        assert!(!second.migrated);
        assert_eq!(second.state, loaded.state);
    }
}
