//! SM-2 spaced-repetition scheduler.
//!
//! The transition is a pure function of `(card, quality)`; callers own the
//! clock-dependent parts (`next_review` is anchored to the start of the
//! current UTC day). Inputs are clamped defensively rather than rejected:
//! a wrong-but-bounded schedule is cheaper than failing a study session.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    start_of_day, SrsCard, SrsResult, WordProgress, DEFAULT_EASE_FACTOR, MAX_EASE_FACTOR,
    MAX_INTERVAL_DAYS, MAX_QUALITY, MIN_EASE_FACTOR, PASSING_QUALITY,
};

/// Clamp a raw quality grade into `[0, 5]`. `NaN` is treated as 1
/// (an incorrect answer), not rejected.
pub(crate) fn normalize_quality(quality: f64) -> f64 {
    if quality.is_nan() {
        1.0
    } else {
        quality.clamp(0.0, MAX_QUALITY as f64)
    }
}

fn normalize_modifier(interval_modifier: f64) -> f64 {
    if interval_modifier.is_finite() && interval_modifier > 0.0 {
        interval_modifier
    } else {
        1.0
    }
}

/// Schedule the next review for a card given a quality grade.
///
/// Quality below 3 is a lapse: repetitions reset and the card comes back
/// tomorrow. On success the interval follows the 1 / 6 / `interval x ease`
/// ladder. The ease factor is adjusted on every review, pass or fail, and
/// clamped to `[1.3, 3.0]`.
///
/// `interval_modifier` scales the computed interval (e.g. 0.8 for an
/// aggressive schedule); the result never drops below one day.
pub fn calculate_next_review(card: &SrsCard, quality: f64, interval_modifier: f64) -> SrsResult {
    let q = normalize_quality(quality);

    let (interval, repetitions) = if q < PASSING_QUALITY as f64 {
        (1, 0)
    } else {
        let next = match card.repetitions {
            0 => 1,
            1 => 6,
            _ => (card.interval as f64 * card.ease_factor).round() as i64,
        };
        (next, card.repetitions + 1)
    };

    let adjustment = 0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02);
    let ease_factor = (card.ease_factor + adjustment).clamp(MIN_EASE_FACTOR, MAX_EASE_FACTOR);

    let interval = (interval as f64 * normalize_modifier(interval_modifier)).round() as i64;
    let interval = interval.clamp(1, MAX_INTERVAL_DAYS);

    SrsResult {
        ease_factor,
        interval,
        repetitions,
        next_review: start_of_day(Utc::now()) + Duration::days(interval),
    }
}

/// Fresh progress record for a word the user just encountered.
/// Due immediately: `next_review` is now, not tomorrow.
pub fn create_initial_progress(word_id: &str) -> WordProgress {
    WordProgress {
        word_id: word_id.to_string(),
        ease_factor: DEFAULT_EASE_FACTOR,
        interval: 0,
        repetitions: 0,
        max_repetitions: 0,
        next_review: Utc::now(),
        last_review: None,
        last_quality: 0,
        times_reviewed: 0,
        times_correct: 0,
    }
}

/// Apply one review to a full progress record.
///
/// Wraps [`calculate_next_review`] and maintains the bookkeeping the pure
/// scheduler does not know about: review counters, the last quality/review
/// fields, and the `max_repetitions` high-water mark.
pub fn update_word_progress(
    progress: &WordProgress,
    quality: f64,
    interval_modifier: f64,
) -> WordProgress {
    let card = SrsCard {
        ease_factor: progress.ease_factor,
        interval: progress.interval,
        repetitions: progress.repetitions,
    };
    let next = calculate_next_review(&card, quality, interval_modifier);

    let q = normalize_quality(quality);
    let correct = q >= PASSING_QUALITY as f64;

    WordProgress {
        word_id: progress.word_id.clone(),
        ease_factor: next.ease_factor,
        interval: next.interval,
        repetitions: next.repetitions,
        max_repetitions: progress.max_repetitions.max(next.repetitions),
        next_review: next.next_review,
        last_review: Some(Utc::now()),
        last_quality: q.round() as i32,
        times_reviewed: progress.times_reviewed + 1,
        times_correct: progress.times_correct + i64::from(correct),
    }
}

/// Whether a word is due for review right now.
pub fn is_due(progress: &WordProgress) -> bool {
    progress.next_review <= Utc::now()
}

/// Filter to due words, most overdue first. Ties keep input order.
pub fn get_due_words(words: &[WordProgress]) -> Vec<&WordProgress> {
    let mut due: Vec<&WordProgress> = words.iter().filter(|w| is_due(w)).collect();
    due.sort_by(|a, b| a.next_review.cmp(&b.next_review));
    due
}

/// Display score in `[0, 100]` combining accuracy and repetition depth.
///
/// Zero for never-reviewed words. Grows with accuracy at fixed depth and
/// with depth at fixed accuracy; depth saturates smoothly so early
/// repetitions move the score the most.
pub fn calculate_mastery(progress: &WordProgress) -> i32 {
    if progress.times_reviewed <= 0 {
        return 0;
    }
    let accuracy = progress.times_correct as f64 / progress.times_reviewed as f64;
    let reps = progress.repetitions.max(0) as f64;
    let depth = reps / (reps + 4.0);
    ((accuracy * 60.0 + depth * 40.0).round() as i32).clamp(0, 100)
}

/// The four answer buttons shown on a review card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewButton {
    Again,
    Hard,
    Good,
    Easy,
}

impl ReviewButton {
    pub const ALL: [ReviewButton; 4] = [
        ReviewButton::Again,
        ReviewButton::Hard,
        ReviewButton::Good,
        ReviewButton::Easy,
    ];

    /// Quality grade the button maps to.
    pub fn quality(self) -> f64 {
        match self {
            ReviewButton::Again => 1.0,
            ReviewButton::Hard => 3.0,
            ReviewButton::Good => 4.0,
            ReviewButton::Easy => 5.0,
        }
    }
}

/// Interval previews for each answer button, formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonIntervals {
    pub again: String,
    pub hard: String,
    pub good: String,
    pub easy: String,
}

/// Preview what each answer button would schedule for this word.
pub fn button_intervals(progress: &WordProgress, interval_modifier: f64) -> ButtonIntervals {
    let card = SrsCard {
        ease_factor: progress.ease_factor,
        interval: progress.interval,
        repetitions: progress.repetitions,
    };
    let preview = |button: ReviewButton| {
        let result = calculate_next_review(&card, button.quality(), interval_modifier);
        format_interval(result.interval)
    };
    ButtonIntervals {
        again: preview(ReviewButton::Again),
        hard: preview(ReviewButton::Hard),
        good: preview(ReviewButton::Good),
        easy: preview(ReviewButton::Easy),
    }
}

/// Compact human form of an interval in days: "3d", "2w", "4mo", "1y".
pub fn format_interval(days: i64) -> String {
    let days = days.max(0);
    if days < 7 {
        format!("{days}d")
    } else if days < 30 {
        format!("{}w", ((days as f64 / 7.0).round() as i64).max(1))
    } else if days < 365 {
        format!("{}mo", ((days as f64 / 30.0).round() as i64).max(1))
    } else {
        format!("{}y", ((days as f64 / 365.0).round() as i64).max(1))
    }
}
