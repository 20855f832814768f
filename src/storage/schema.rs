//! Versioned shape of the persisted study-state blob.
//!
//! V1 is whatever an older client wrote: unversioned, dates in several
//! formats, records that may violate invariants. V2 is the current typed
//! schema, produced only by this crate's own `save` path. Detection is
//! conservative: a blob is treated as V2 only when it carries the current
//! version tag *and* passes the migration check; anything else goes
//! through the V1 repair path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sanitize::{sanitize_progress, sanitize_study_history, sanitize_user_stats};
use crate::storage::migrate::{migrate_last_review_date, needs_migration};
use crate::types::{DailyActivity, UserStats, WordProgress};

/// Current persisted schema version.
pub const SCHEMA_VERSION: u32 = 2;

/// The typed study state nested under the blob's `state` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredState {
    /// Last study day as `YYYY-MM-DD`, or null if unknown.
    pub last_review_date: Option<String>,
    pub progress: BTreeMap<String, WordProgress>,
    pub stats: UserStats,
    pub history: BTreeMap<String, DailyActivity>,
}

/// The full blob as written to the key-value store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedBlob {
    pub schema_version: u32,
    pub state: StoredState,
}

impl PersistedBlob {
    pub fn current(state: StoredState) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            state,
        }
    }
}

/// Result of bringing a blob up to the current schema.
#[derive(Debug)]
pub struct MigrationOutcome {
    pub state: StoredState,
    /// The blob on disk differed from `state`; it should be written back.
    pub write_back: bool,
    /// What the sanitizers repaired, if anything.
    pub notes: Vec<String>,
}

/// A decoded blob tagged by schema version.
#[derive(Debug)]
pub enum Schema {
    /// Legacy or unversioned data; must run through the sanitizers.
    V1(Value),
    /// Current schema; trusted as-is.
    V2(StoredState),
}

impl Schema {
    /// Classify a raw blob.
    pub fn detect(raw: Value) -> Schema {
        let versioned =
            raw.get("schemaVersion").and_then(Value::as_u64) == Some(u64::from(SCHEMA_VERSION));
        if versioned && !needs_migration(&raw) {
            if let Ok(blob) = serde_json::from_value::<PersistedBlob>(raw.clone()) {
                return Schema::V2(blob.state);
            }
        }
        Schema::V1(raw)
    }

    /// Produce current-schema state, repairing a V1 blob field by field.
    pub fn into_current(self) -> MigrationOutcome {
        match self {
            Schema::V2(state) => MigrationOutcome {
                state,
                write_back: false,
                notes: Vec::new(),
            },
            Schema::V1(raw) => {
                let flagged = needs_migration(&raw);
                let missing = Value::Null;
                let state_raw = raw.get("state").unwrap_or(&missing);

                let input_date = state_raw.get("lastReviewDate").and_then(Value::as_str);
                let last_review_date = migrate_last_review_date(input_date);
                let date_changed = last_review_date.as_deref() != input_date;

                let progress = sanitize_progress(state_raw.get("progress").unwrap_or(&missing));
                let stats = sanitize_user_stats(state_raw.get("stats").unwrap_or(&missing));
                let history =
                    sanitize_study_history(state_raw.get("history").unwrap_or(&missing));

                let mut notes = Vec::new();
                if date_changed {
                    notes.push("lastReviewDate: normalized".to_string());
                }
                notes.extend(progress.notes);
                notes.extend(stats.notes);
                notes.extend(history.notes);

                let repaired =
                    date_changed || progress.repaired || stats.repaired || history.repaired;

                MigrationOutcome {
                    state: StoredState {
                        last_review_date,
                        progress: progress.value,
                        stats: stats.value,
                        history: history.value,
                    },
                    write_back: flagged || repaired,
                    notes,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_current_versioned_blob() {
        let blob = PersistedBlob::current(StoredState::default());
        let raw = serde_json::to_value(&blob).unwrap();
        match Schema::detect(raw) {
            Schema::V2(state) => assert_eq!(state, StoredState::default()),
            Schema::V1(_) => panic!("expected current schema"),
        }
    }

    #[test]
    fn test_detect_unversioned_blob_as_legacy() {
        let raw = json!({ "state": { "lastReviewDate": "2024-01-15" } });
        assert!(matches!(Schema::detect(raw), Schema::V1(_)));
    }

    #[test]
    fn test_versioned_but_corrupt_blob_goes_through_repair() {
        // a version tag does not exempt corrupt data from migration
        let raw = json!({
            "schemaVersion": 2,
            "state": {
                "progress": {
                    "word1": {
                        "easeFactor": 0.5,
                        "timesReviewed": 1,
                        "timesCorrect": 0,
                        "repetitions": 0,
                        "interval": 0
                    }
                }
            }
        });
        assert!(matches!(Schema::detect(raw), Schema::V1(_)));
    }

    #[test]
    fn test_legacy_migration_repairs_everything() {
        let raw = json!({
            "state": {
                "lastReviewDate": "Mon Jan 15 2024",
                "progress": {
                    "word1": {
                        "wordId": "word1",
                        "easeFactor": 5.0,
                        "interval": -3,
                        "repetitions": 2,
                        "maxRepetitions": 1,
                        "nextReview": "2024-01-16T00:00:00Z",
                        "lastReview": null,
                        "lastQuality": 4,
                        "timesReviewed": 5,
                        "timesCorrect": 9
                    }
                },
                "stats": { "xp": -10, "level": 0 },
                "history": { "nonsense-key": { "reviews": 1, "wordsLearned": 0 } }
            }
        });

        let outcome = Schema::detect(raw).into_current();
        assert!(outcome.write_back);
        assert!(!outcome.notes.is_empty());
        assert_eq!(outcome.state.last_review_date.as_deref(), Some("2024-01-15"));

        let word = &outcome.state.progress["word1"];
        assert_eq!(word.ease_factor, 3.0);
        assert_eq!(word.interval, 0);
        assert_eq!(word.max_repetitions, 2);
        assert_eq!(word.times_correct, 5);

        assert_eq!(outcome.state.stats.xp, 0);
        assert_eq!(outcome.state.stats.level, 1);
        assert!(outcome.state.history.is_empty());
    }

    #[test]
    fn test_clean_legacy_blob_still_loads_without_write_back() {
        // unversioned but invariant-clean: usable as-is, nothing to rewrite
        let raw = json!({
            "state": {
                "lastReviewDate": "2024-01-15",
                "progress": {},
                "stats": {
                    "xp": 100, "level": 2, "streak": 1, "longestStreak": 3,
                    "lastStudyDate": null, "achievements": [],
                    "wordsLearned": 1, "wordsInProgress": 2,
                    "totalReviews": 10, "correctReviews": 8
                },
                "history": {}
            }
        });

        let outcome = Schema::detect(raw).into_current();
        assert!(!outcome.write_back, "notes: {:?}", outcome.notes);
        assert_eq!(outcome.state.stats.xp, 100);
        assert_eq!(outcome.state.last_review_date.as_deref(), Some("2024-01-15"));
    }

    #[test]
    fn test_unparseable_legacy_date_degrades_to_null() {
        let raw = json!({ "state": { "lastReviewDate": "not-a-date" } });
        let outcome = Schema::detect(raw).into_current();
        assert!(outcome.state.last_review_date.is_none());
        assert!(outcome.write_back);
    }

    #[test]
    fn test_blob_round_trip() {
        let mut state = StoredState::default();
        state.last_review_date = Some("2024-01-15".to_string());
        state.stats.xp = 150;

        let text = serde_json::to_string(&PersistedBlob::current(state.clone())).unwrap();
        let raw: Value = serde_json::from_str(&text).unwrap();
        let outcome = Schema::detect(raw).into_current();

        assert!(!outcome.write_back);
        assert_eq!(outcome.state, state);
    }
}
