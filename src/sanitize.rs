//! Repair of persisted progress data.
//!
//! Everything here is total: whatever JSON arrives from disk, each
//! function returns a value satisfying the record invariants. Corruption
//! is repaired toward the nearest valid value, never rejected, because
//! these functions sit between raw storage bytes and code that assumes
//! the invariants hold. The only thing ever dropped outright is an entry
//! whose key cannot be valid (an empty word id, a malformed date key).
//!
//! Each sanitizer reports what it changed through [`Sanitized`], so tests
//! and diagnostics can see the repairs without the callers having to
//! handle an error path.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use crate::types::{
    DailyActivity, UserStats, WordProgress, DEFAULT_EASE_FACTOR, MAX_EASE_FACTOR,
    MAX_INTERVAL_DAYS, MAX_QUALITY, MIN_EASE_FACTOR,
};

/// A repaired value plus a record of what the repair touched.
///
/// `repaired == false` means the input already satisfied every invariant
/// and `value` is a faithful conversion of it.
#[derive(Debug, Clone)]
pub struct Sanitized<T> {
    pub value: T,
    pub repaired: bool,
    pub notes: Vec<String>,
}

#[derive(Default)]
struct Repair {
    repaired: bool,
    notes: Vec<String>,
}

impl Repair {
    fn note(&mut self, field: &str, what: &str) {
        self.repaired = true;
        self.notes.push(format!("{field}: {what}"));
    }

    fn absorb(&mut self, prefix: &str, repaired: bool, notes: Vec<String>) {
        self.repaired |= repaired;
        self.notes
            .extend(notes.into_iter().map(|n| format!("{prefix}.{n}")));
    }

    fn finish<T>(self, value: T) -> Sanitized<T> {
        Sanitized {
            value,
            repaired: self.repaired,
            notes: self.notes,
        }
    }
}

/// Finite numeric field, or the field-specific default.
fn finite_f64(raw: &Value, key: &str, default: f64, rep: &mut Repair) -> f64 {
    match raw.get(key) {
        Some(v) => match v.as_f64() {
            Some(n) if n.is_finite() => n,
            _ => {
                rep.note(key, "not a finite number; using default");
                default
            }
        },
        None => {
            rep.note(key, "missing; using default");
            default
        }
    }
}

/// Integer field clamped into `[min, max]`.
fn int_in(raw: &Value, key: &str, default: i64, min: i64, max: i64, rep: &mut Repair) -> i64 {
    let v = finite_f64(raw, key, default as f64, rep);
    let rounded = v.round();
    if rounded != v {
        rep.note(key, "fractional value; rounded");
    }
    if rounded < min as f64 {
        rep.note(key, "below minimum; clamped");
        min
    } else if rounded > max as f64 {
        rep.note(key, "above maximum; clamped");
        max
    } else {
        rounded as i64
    }
}

fn clamp_f64(value: f64, min: f64, max: f64, key: &str, rep: &mut Repair) -> f64 {
    if value < min {
        rep.note(key, "below minimum; clamped");
        min
    } else if value > max {
        rep.note(key, "above maximum; clamped");
        max
    } else {
        value
    }
}

/// Strict `YYYY-MM-DD` shape check (digits and dashes only).
pub(crate) fn is_iso_date(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && [0usize, 1, 2, 3, 5, 6, 8, 9]
            .iter()
            .all(|&i| b[i].is_ascii_digit())
}

/// Parse a calendar date out of the formats seen in legacy persisted data:
/// ISO dates/datetimes, `Mon Jan 15 2024`, and `January 15, 2024`.
pub(crate) fn parse_flexible_date(s: &str) -> Option<NaiveDate> {
    for fmt in ["%Y-%m-%d", "%a %b %d %Y", "%B %d, %Y", "%b %d, %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    None
}

/// Parse an instant from the same formats; bare dates become midnight UTC.
pub(crate) fn parse_flexible_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    parse_flexible_date(s).map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Date-like JSON value: an ISO (or legacy-format) string, or epoch millis.
fn parse_datetime_value(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => parse_flexible_datetime(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Repair a single word-progress record.
///
/// Numeric fields fall back to their defaults (ease 2.5, counters 0) and
/// are clamped into range; `timesCorrect` is capped at `timesReviewed`;
/// `maxRepetitions` is raised to at least `repetitions`. `nextReview` is
/// always a concrete instant (missing or unparseable becomes now), while
/// a `null` `lastReview` stays null — it means "never reviewed".
pub fn sanitize_word_progress(raw: &Value) -> Sanitized<WordProgress> {
    let mut rep = Repair::default();
    let placeholder = Value::Null;
    let obj = if raw.is_object() {
        raw
    } else {
        rep.note("record", "not an object; rebuilt from defaults");
        &placeholder
    };

    let word_id = match obj.get("wordId").and_then(Value::as_str) {
        Some(s) => s.to_string(),
        None => {
            rep.note("wordId", "missing or not a string; left empty");
            String::new()
        }
    };

    let ease_factor = clamp_f64(
        finite_f64(obj, "easeFactor", DEFAULT_EASE_FACTOR, &mut rep),
        MIN_EASE_FACTOR,
        MAX_EASE_FACTOR,
        "easeFactor",
        &mut rep,
    );
    let interval = int_in(obj, "interval", 0, 0, MAX_INTERVAL_DAYS, &mut rep);
    let repetitions = int_in(obj, "repetitions", 0, 0, i32::MAX as i64, &mut rep) as i32;
    let max_raw = int_in(obj, "maxRepetitions", 0, 0, i32::MAX as i64, &mut rep) as i32;
    let max_repetitions = if max_raw < repetitions {
        rep.note("maxRepetitions", "below repetitions; raised");
        repetitions
    } else {
        max_raw
    };
    let last_quality = int_in(obj, "lastQuality", 0, 0, MAX_QUALITY as i64, &mut rep) as i32;
    let times_reviewed = int_in(obj, "timesReviewed", 0, 0, i64::MAX, &mut rep);
    let times_correct = {
        let tc = int_in(obj, "timesCorrect", 0, 0, i64::MAX, &mut rep);
        if tc > times_reviewed {
            rep.note("timesCorrect", "exceeds timesReviewed; capped");
            times_reviewed
        } else {
            tc
        }
    };

    let next_review = match obj.get("nextReview") {
        Some(v) if !v.is_null() => match parse_datetime_value(v) {
            Some(dt) => dt,
            None => {
                rep.note("nextReview", "unparseable; reset to now");
                Utc::now()
            }
        },
        _ => {
            rep.note("nextReview", "missing; reset to now");
            Utc::now()
        }
    };

    let last_review = match obj.get("lastReview") {
        None | Some(Value::Null) => None,
        Some(v) => match parse_datetime_value(v) {
            Some(dt) => Some(dt),
            None => {
                rep.note("lastReview", "unparseable; cleared");
                None
            }
        },
    };

    rep.finish(WordProgress {
        word_id,
        ease_factor,
        interval,
        repetitions,
        max_repetitions,
        next_review,
        last_review,
        last_quality,
        times_reviewed,
        times_correct,
    })
}

/// Repair a whole progress map. Entries keyed by an empty id are dropped
/// entirely; the map key is authoritative for each record's `wordId`.
pub fn sanitize_progress(raw: &Value) -> Sanitized<BTreeMap<String, WordProgress>> {
    let mut rep = Repair::default();
    let mut out = BTreeMap::new();

    match raw {
        Value::Null => {}
        Value::Object(map) => {
            for (key, entry) in map {
                if key.is_empty() {
                    rep.note("progress", "dropped entry with empty word id");
                    continue;
                }
                let record = sanitize_word_progress(entry);
                let mut value = record.value;
                if value.word_id != *key {
                    if !value.word_id.is_empty() {
                        rep.note("progress", "entry wordId disagreed with its key; key wins");
                    }
                    value.word_id = key.clone();
                }
                rep.absorb(&format!("progress[{key}]"), record.repaired, record.notes);
                out.insert(key.clone(), value);
            }
        }
        _ => rep.note("progress", "not an object; cleared"),
    }

    rep.finish(out)
}

/// Repair the aggregate stats record.
pub fn sanitize_user_stats(raw: &Value) -> Sanitized<UserStats> {
    let mut rep = Repair::default();
    let placeholder = Value::Null;
    let obj = if raw.is_object() {
        raw
    } else {
        rep.note("stats", "not an object; rebuilt from defaults");
        &placeholder
    };

    let xp = int_in(obj, "xp", 0, 0, i64::MAX, &mut rep);
    let level = int_in(obj, "level", 1, 1, i32::MAX as i64, &mut rep) as i32;
    let streak = int_in(obj, "streak", 0, 0, i32::MAX as i64, &mut rep) as i32;
    let longest_streak = {
        let longest = int_in(obj, "longestStreak", 0, 0, i32::MAX as i64, &mut rep) as i32;
        if longest < streak {
            rep.note("longestStreak", "below streak; raised");
            streak
        } else {
            longest
        }
    };

    let last_study_date = match obj.get("lastStudyDate") {
        None | Some(Value::Null) => None,
        Some(v) => match parse_datetime_value(v) {
            Some(dt) => Some(dt),
            None => {
                rep.note("lastStudyDate", "unparseable; cleared");
                None
            }
        },
    };

    let achievements = match obj.get("achievements") {
        None | Some(Value::Null) => {
            rep.note("achievements", "missing; using empty set");
            BTreeSet::new()
        }
        Some(Value::Array(items)) => {
            let mut set = BTreeSet::new();
            let mut dropped = 0;
            for item in items {
                match item.as_str() {
                    Some(s) => {
                        set.insert(s.to_string());
                    }
                    None => dropped += 1,
                }
            }
            if dropped > 0 {
                rep.note("achievements", "dropped non-string entries");
            }
            set
        }
        Some(_) => {
            rep.note("achievements", "not a list; cleared");
            BTreeSet::new()
        }
    };

    let words_learned = int_in(obj, "wordsLearned", 0, 0, i64::MAX, &mut rep);
    let words_in_progress = int_in(obj, "wordsInProgress", 0, 0, i64::MAX, &mut rep);
    let total_reviews = int_in(obj, "totalReviews", 0, 0, i64::MAX, &mut rep);
    let correct_reviews = {
        let correct = int_in(obj, "correctReviews", 0, 0, i64::MAX, &mut rep);
        if correct > total_reviews {
            rep.note("correctReviews", "exceeds totalReviews; capped");
            total_reviews
        } else {
            correct
        }
    };

    rep.finish(UserStats {
        xp,
        level,
        streak,
        longest_streak,
        last_study_date,
        achievements,
        words_learned,
        words_in_progress,
        total_reviews,
        correct_reviews,
    })
}

/// Repair the study-history map. Keys that are not strict `YYYY-MM-DD`
/// are dropped, not repaired; counts are clamped to zero or above.
pub fn sanitize_study_history(raw: &Value) -> Sanitized<BTreeMap<String, DailyActivity>> {
    let mut rep = Repair::default();
    let mut out = BTreeMap::new();

    match raw {
        Value::Null => {}
        Value::Object(map) => {
            for (key, entry) in map {
                if !is_iso_date(key) {
                    rep.note("history", &format!("dropped entry with invalid date key {key:?}"));
                    continue;
                }
                let mut entry_rep = Repair::default();
                let reviews = int_in(entry, "reviews", 0, 0, i64::MAX, &mut entry_rep);
                let words_learned = int_in(entry, "wordsLearned", 0, 0, i64::MAX, &mut entry_rep);
                rep.absorb(
                    &format!("history[{key}]"),
                    entry_rep.repaired,
                    entry_rep.notes,
                );
                out.insert(
                    key.clone(),
                    DailyActivity {
                        reviews,
                        words_learned,
                    },
                );
            }
        }
        _ => rep.note("history", "not an object; cleared"),
    }

    rep.finish(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn valid_progress_json() -> Value {
        json!({
            "wordId": "test-word",
            "easeFactor": 2.5,
            "interval": 10,
            "repetitions": 3,
            "maxRepetitions": 3,
            "nextReview": "2024-01-16T00:00:00Z",
            "lastReview": "2024-01-15T00:00:00Z",
            "lastQuality": 4,
            "timesReviewed": 10,
            "timesCorrect": 8
        })
    }

    #[test]
    fn test_valid_progress_passes_through_unrepaired() {
        let result = sanitize_word_progress(&valid_progress_json());
        assert!(!result.repaired, "notes: {:?}", result.notes);
        assert_eq!(result.value.ease_factor, 2.5);
        assert_eq!(result.value.interval, 10);
        assert_eq!(result.value.repetitions, 3);
        assert_eq!(result.value.times_correct, 8);
    }

    #[test]
    fn test_ease_factor_clamped_into_range() {
        let mut low = valid_progress_json();
        low["easeFactor"] = json!(0.5);
        assert_eq!(sanitize_word_progress(&low).value.ease_factor, 1.3);

        let mut high = valid_progress_json();
        high["easeFactor"] = json!(5.0);
        assert_eq!(sanitize_word_progress(&high).value.ease_factor, 3.0);
    }

    #[test]
    fn test_negative_counters_reset_to_zero() {
        let mut raw = valid_progress_json();
        raw["interval"] = json!(-5);
        raw["repetitions"] = json!(-2);
        raw["timesReviewed"] = json!(-10);
        raw["timesCorrect"] = json!(-5);

        let result = sanitize_word_progress(&raw);
        assert!(result.repaired);
        assert_eq!(result.value.interval, 0);
        assert_eq!(result.value.repetitions, 0);
        assert_eq!(result.value.times_reviewed, 0);
        assert_eq!(result.value.times_correct, 0);
    }

    #[test]
    fn test_times_correct_capped_at_times_reviewed() {
        let mut raw = valid_progress_json();
        raw["timesReviewed"] = json!(5);
        raw["timesCorrect"] = json!(10);

        let result = sanitize_word_progress(&raw);
        assert_eq!(result.value.times_correct, 5);
    }

    #[test]
    fn test_last_quality_clamped() {
        let mut low = valid_progress_json();
        low["lastQuality"] = json!(-1);
        assert_eq!(sanitize_word_progress(&low).value.last_quality, 0);

        let mut high = valid_progress_json();
        high["lastQuality"] = json!(10);
        assert_eq!(sanitize_word_progress(&high).value.last_quality, 5);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let partial = json!({ "wordId": "test" });
        let result = sanitize_word_progress(&partial);

        assert!(result.repaired);
        assert_eq!(result.value.ease_factor, DEFAULT_EASE_FACTOR);
        assert_eq!(result.value.interval, 0);
        assert_eq!(result.value.repetitions, 0);
        assert!(result.value.last_review.is_none());
    }

    #[test]
    fn test_non_object_record_becomes_defaults() {
        let result = sanitize_word_progress(&json!("garbage"));
        assert!(result.repaired);
        assert_eq!(result.value.ease_factor, DEFAULT_EASE_FACTOR);
        assert_eq!(result.value.times_reviewed, 0);
    }

    #[test]
    fn test_date_strings_are_parsed() {
        let mut raw = valid_progress_json();
        raw["nextReview"] = json!("2024-01-15T00:00:00.000Z");
        raw["lastReview"] = json!("2024-01-14T00:00:00.000Z");

        let result = sanitize_word_progress(&raw);
        assert!(!result.repaired);
        assert_eq!(
            result.value.next_review.date_naive(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(
            result.value.last_review.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2024, 1, 14).unwrap()
        );
    }

    #[test]
    fn test_null_last_review_is_preserved() {
        let mut raw = valid_progress_json();
        raw["lastReview"] = Value::Null;

        let result = sanitize_word_progress(&raw);
        assert!(!result.repaired);
        assert!(result.value.last_review.is_none());
    }

    #[test]
    fn test_unparseable_next_review_becomes_now() {
        let mut raw = valid_progress_json();
        raw["nextReview"] = json!("not-a-date");

        let before = Utc::now();
        let result = sanitize_word_progress(&raw);
        assert!(result.repaired);
        assert!(result.value.next_review >= before);
    }

    #[test]
    fn test_max_repetitions_raised_to_repetitions() {
        let mut raw = valid_progress_json();
        raw["repetitions"] = json!(5);
        raw.as_object_mut().unwrap().remove("maxRepetitions");

        let result = sanitize_word_progress(&raw);
        assert_eq!(result.value.max_repetitions, 5);
    }

    #[test]
    fn test_huge_numbers_clamp_finite() {
        let mut raw = valid_progress_json();
        raw["easeFactor"] = json!(1e308);
        raw["interval"] = json!(1e30);
        raw["lastQuality"] = json!(1e12);

        let result = sanitize_word_progress(&raw);
        assert_eq!(result.value.ease_factor, MAX_EASE_FACTOR);
        assert_eq!(result.value.interval, MAX_INTERVAL_DAYS);
        assert_eq!(result.value.last_quality, 5);
    }

    #[test]
    fn test_progress_map_sanitizes_every_entry() {
        let raw = json!({
            "word1": {
                "wordId": "word1",
                "easeFactor": 0.5,
                "interval": 10,
                "repetitions": 3,
                "maxRepetitions": 3,
                "nextReview": "2024-01-16T00:00:00Z",
                "lastReview": null,
                "lastQuality": 4,
                "timesReviewed": 10,
                "timesCorrect": 12
            },
            "word2": {
                "wordId": "word2",
                "easeFactor": 2.5,
                "interval": -5,
                "repetitions": 2,
                "maxRepetitions": 2,
                "nextReview": "2024-01-16T00:00:00Z",
                "lastReview": null,
                "lastQuality": 3,
                "timesReviewed": 5,
                "timesCorrect": 3
            }
        });

        let result = sanitize_progress(&raw);
        assert!(result.repaired);
        assert_eq!(result.value["word1"].ease_factor, 1.3);
        assert_eq!(result.value["word1"].times_correct, 10);
        assert_eq!(result.value["word2"].interval, 0);
    }

    #[test]
    fn test_progress_map_drops_empty_keys() {
        let entry = valid_progress_json();
        let mut empty_key_entry = valid_progress_json();
        empty_key_entry["wordId"] = json!("");

        let raw = json!({ "validWord": entry, "": empty_key_entry });
        let result = sanitize_progress(&raw);

        assert!(result.repaired);
        assert_eq!(result.value.keys().collect::<Vec<_>>(), vec!["validWord"]);
        // key overrides the record's own id
        assert_eq!(result.value["validWord"].word_id, "validWord");
    }

    #[test]
    fn test_progress_map_empty_and_null_inputs() {
        assert!(sanitize_progress(&json!({})).value.is_empty());
        assert!(sanitize_progress(&Value::Null).value.is_empty());
        assert!(!sanitize_progress(&Value::Null).repaired);

        let from_garbage = sanitize_progress(&json!(42));
        assert!(from_garbage.value.is_empty());
        assert!(from_garbage.repaired);
    }

    fn valid_stats_json() -> Value {
        json!({
            "xp": 1000,
            "level": 5,
            "streak": 10,
            "longestStreak": 15,
            "lastStudyDate": "2024-01-15T00:00:00Z",
            "achievements": ["first_review", "week_streak"],
            "wordsLearned": 100,
            "wordsInProgress": 50,
            "totalReviews": 500,
            "correctReviews": 400
        })
    }

    #[test]
    fn test_valid_stats_pass_through_unrepaired() {
        let result = sanitize_user_stats(&valid_stats_json());
        assert!(!result.repaired, "notes: {:?}", result.notes);
        assert_eq!(result.value.xp, 1000);
        assert_eq!(result.value.level, 5);
        assert_eq!(result.value.streak, 10);
        assert!(result.value.achievements.contains("week_streak"));
    }

    #[test]
    fn test_stats_negative_values_reset() {
        let mut raw = valid_stats_json();
        raw["xp"] = json!(-100);
        raw["streak"] = json!(-5);
        raw["wordsLearned"] = json!(-10);

        let result = sanitize_user_stats(&raw);
        assert_eq!(result.value.xp, 0);
        assert_eq!(result.value.streak, 0);
        assert_eq!(result.value.words_learned, 0);
    }

    #[test]
    fn test_stats_level_floored_at_one() {
        let mut raw = valid_stats_json();
        raw["level"] = json!(0);
        assert_eq!(sanitize_user_stats(&raw).value.level, 1);
    }

    #[test]
    fn test_stats_correct_reviews_capped() {
        let mut raw = valid_stats_json();
        raw["totalReviews"] = json!(100);
        raw["correctReviews"] = json!(200);
        assert_eq!(sanitize_user_stats(&raw).value.correct_reviews, 100);
    }

    #[test]
    fn test_stats_longest_streak_at_least_streak() {
        let mut raw = valid_stats_json();
        raw["streak"] = json!(20);
        raw["longestStreak"] = json!(10);
        assert_eq!(sanitize_user_stats(&raw).value.longest_streak, 20);
    }

    #[test]
    fn test_stats_non_list_achievements_cleared() {
        let mut raw = valid_stats_json();
        raw["achievements"] = json!("not-an-array");

        let result = sanitize_user_stats(&raw);
        assert!(result.repaired);
        assert!(result.value.achievements.is_empty());
    }

    #[test]
    fn test_stats_achievement_duplicates_collapse() {
        let mut raw = valid_stats_json();
        raw["achievements"] = json!(["a", "a", "b"]);
        assert_eq!(sanitize_user_stats(&raw).value.achievements.len(), 2);
    }

    #[test]
    fn test_stats_null_study_date_preserved() {
        let mut raw = valid_stats_json();
        raw["lastStudyDate"] = Value::Null;

        let result = sanitize_user_stats(&raw);
        assert!(!result.repaired);
        assert!(result.value.last_study_date.is_none());
    }

    #[test]
    fn test_history_valid_entries_kept() {
        let raw = json!({
            "2024-01-15": { "reviews": 20, "wordsLearned": 5 },
            "2024-01-16": { "reviews": 15, "wordsLearned": 3 }
        });

        let result = sanitize_study_history(&raw);
        assert!(!result.repaired);
        assert_eq!(result.value["2024-01-15"].reviews, 20);
        assert_eq!(result.value["2024-01-16"].words_learned, 3);
    }

    #[test]
    fn test_history_invalid_date_keys_dropped() {
        let raw = json!({
            "2024-01-15": { "reviews": 20, "wordsLearned": 5 },
            "Jan 15 2024": { "reviews": 15, "wordsLearned": 3 },
            "15-01-2024": { "reviews": 10, "wordsLearned": 2 }
        });

        let result = sanitize_study_history(&raw);
        assert!(result.repaired);
        assert_eq!(result.value.keys().collect::<Vec<_>>(), vec!["2024-01-15"]);
    }

    #[test]
    fn test_history_negative_counts_reset() {
        let raw = json!({ "2024-01-15": { "reviews": -5, "wordsLearned": -2 } });
        let result = sanitize_study_history(&raw);
        assert_eq!(result.value["2024-01-15"].reviews, 0);
        assert_eq!(result.value["2024-01-15"].words_learned, 0);
    }

    #[test]
    fn test_history_missing_counts_default() {
        let raw = json!({ "2024-01-15": {} });
        let result = sanitize_study_history(&raw);
        assert_eq!(result.value["2024-01-15"].reviews, 0);
        assert_eq!(result.value["2024-01-15"].words_learned, 0);
    }

    #[test]
    fn test_iso_date_shape_check() {
        assert!(is_iso_date("2024-01-15"));
        assert!(!is_iso_date("Jan 15 2024"));
        assert!(!is_iso_date("15-01-2024"));
        assert!(!is_iso_date("2024-1-15"));
        assert!(!is_iso_date(""));
    }

    fn arb_field() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<f64>().prop_map(Value::from),
            (-1_000_000i64..1_000_000).prop_map(Value::from),
            "[a-zA-Z0-9 :TZ.-]{0,24}".prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn prop_sanitize_word_progress_is_idempotent(
            ease in arb_field(),
            interval in arb_field(),
            reps in arb_field(),
            max_reps in arb_field(),
            next in arb_field(),
            last in arb_field(),
            quality in arb_field(),
            reviewed in arb_field(),
            correct in arb_field(),
        ) {
            let raw = json!({
                "wordId": "w1",
                "easeFactor": ease,
                "interval": interval,
                "repetitions": reps,
                "maxRepetitions": max_reps,
                "nextReview": next,
                "lastReview": last,
                "lastQuality": quality,
                "timesReviewed": reviewed,
                "timesCorrect": correct,
            });

            let first = sanitize_word_progress(&raw);
            let round_trip = serde_json::to_value(&first.value).unwrap();
            let second = sanitize_word_progress(&round_trip);

            prop_assert_eq!(&first.value, &second.value);
            prop_assert!(!second.repaired, "second pass repaired: {:?}", second.notes);

            // invariants hold regardless of input
            let p = &first.value;
            prop_assert!(p.ease_factor >= MIN_EASE_FACTOR && p.ease_factor <= MAX_EASE_FACTOR);
            prop_assert!(p.interval >= 0);
            prop_assert!(p.repetitions >= 0);
            prop_assert!(p.max_repetitions >= p.repetitions);
            prop_assert!((0..=5).contains(&p.last_quality));
            prop_assert!(p.times_correct >= 0 && p.times_correct <= p.times_reviewed);
        }

        #[test]
        fn prop_sanitize_user_stats_is_idempotent(
            xp in arb_field(),
            level in arb_field(),
            streak in arb_field(),
            longest in arb_field(),
            last in arb_field(),
            learned in arb_field(),
            in_progress in arb_field(),
            total in arb_field(),
            correct in arb_field(),
        ) {
            let raw = json!({
                "xp": xp,
                "level": level,
                "streak": streak,
                "longestStreak": longest,
                "lastStudyDate": last,
                "achievements": ["a"],
                "wordsLearned": learned,
                "wordsInProgress": in_progress,
                "totalReviews": total,
                "correctReviews": correct,
            });

            let first = sanitize_user_stats(&raw);
            let round_trip = serde_json::to_value(&first.value).unwrap();
            let second = sanitize_user_stats(&round_trip);

            prop_assert_eq!(&first.value, &second.value);
            prop_assert!(!second.repaired, "second pass repaired: {:?}", second.notes);

            let s = &first.value;
            prop_assert!(s.xp >= 0);
            prop_assert!(s.level >= 1);
            prop_assert!(s.streak >= 0 && s.longest_streak >= s.streak);
            prop_assert!(s.correct_reviews >= 0 && s.correct_reviews <= s.total_reviews);
        }
    }
}
