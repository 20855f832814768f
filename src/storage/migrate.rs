//! Detection and repair of legacy persisted blobs.

use serde_json::Value;

use crate::sanitize::{is_iso_date, parse_flexible_date};
use crate::types::{MAX_EASE_FACTOR, MIN_EASE_FACTOR};

/// Whether a raw persisted blob needs to be migrated before use.
///
/// True only for a JSON object carrying a `state` whose contents violate
/// an invariant: a `lastReviewDate` not in `YYYY-MM-DD` form, a progress
/// entry with `timesCorrect > timesReviewed`, an `easeFactor` outside
/// `[1.3, 3.0]`, or a negative counter. Null, primitives, and objects
/// without a `state` key are not migration candidates.
pub fn needs_migration(blob: &Value) -> bool {
    let Some(state) = blob.as_object().and_then(|o| o.get("state")) else {
        return false;
    };

    if let Some(date) = state.get("lastReviewDate").and_then(Value::as_str) {
        if !is_iso_date(date) {
            return true;
        }
    }

    if let Some(progress) = state.get("progress").and_then(Value::as_object) {
        for entry in progress.values() {
            let field = |key: &str| entry.get(key).and_then(Value::as_f64);

            if let (Some(correct), Some(reviewed)) = (field("timesCorrect"), field("timesReviewed"))
            {
                if correct > reviewed {
                    return true;
                }
            }
            if let Some(ease) = field("easeFactor") {
                if !(MIN_EASE_FACTOR..=MAX_EASE_FACTOR).contains(&ease) {
                    return true;
                }
            }
            for key in ["repetitions", "interval", "timesReviewed", "timesCorrect"] {
                if let Some(v) = field(key) {
                    if v < 0.0 {
                        return true;
                    }
                }
            }
        }
    }

    false
}

/// Normalize a legacy `lastReviewDate` to `YYYY-MM-DD`.
///
/// Null stays null; an already-ISO string passes through untouched; any
/// other parseable form is reformatted. An unparseable date returns null
/// — a bad date is not worth preserving, and callers treat null as
/// "unknown".
pub fn migrate_last_review_date(value: Option<&str>) -> Option<String> {
    let s = value?;
    if is_iso_date(s) {
        return Some(s.to_string());
    }
    parse_flexible_date(s).map(|d| d.format("%Y-%m-%d").to_string())
}
