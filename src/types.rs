//! Core record types and progression constants.
//!
//! Every persisted record keeps the camelCase key shape produced by the
//! web client (`wordId`, `easeFactor`, `lastStudyDate`, ...) so local
//! storage written by either side stays readable by the other.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Ease factor assigned to a word that has never been reviewed.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
/// Lower bound for the ease factor; below this, intervals stop shrinking.
pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Upper bound for the ease factor.
pub const MAX_EASE_FACTOR: f64 = 3.0;

/// Review quality grades run from 0 (blackout) to 5 (perfect recall).
pub const MIN_QUALITY: i32 = 0;
pub const MAX_QUALITY: i32 = 5;
/// Qualities at or above this count as a correct answer.
pub const PASSING_QUALITY: i32 = 3;

/// Hard ceiling on a scheduled interval (about 100 years). Keeps repeated
/// ease multiplication from producing dates outside the representable range.
pub const MAX_INTERVAL_DAYS: i64 = 36_500;

/// A word counts as "learned" once its repetition high-water mark reaches
/// this depth; the mark never resets, so the status is stable across lapses.
pub const LEARNED_REPETITIONS: i32 = 3;

/// Cumulative XP required to reach each level (index 0 = level 1).
/// Exponential curve; levels past the table extrapolate from its tail.
pub const LEVEL_THRESHOLDS: [i64; 50] = [
    0, 100, 250, 500, 1000, 1750, 2750, 4000, 5500, 7500, //
    10_000, 13_000, 16_500, 20_500, 25_000, 30_000, 36_000, 43_000, 51_000, 60_000, //
    70_000, 82_000, 96_000, 112_000, 130_000, 150_000, 173_000, 199_000, 228_000, 260_000, //
    295_000, 335_000, 380_000, 430_000, 485_000, 545_000, 610_000, 682_000, 762_000, 850_000, //
    945_000, 1_050_000, 1_165_000, 1_290_000, 1_425_000, 1_575_000, 1_740_000, 1_920_000,
    2_120_000, 2_340_000,
];

/// Study events that award XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum XpEvent {
    CorrectFlashcard,
    CorrectQuiz,
    CorrectTyping,
    TranslationBase,
    PerfectSession,
    DailyGoalMet,
    NewWordLearned,
}

impl XpEvent {
    /// Base XP for the event, before any streak multiplier.
    pub fn base_reward(self) -> i64 {
        match self {
            XpEvent::CorrectFlashcard => 10,
            XpEvent::CorrectQuiz => 15,
            XpEvent::CorrectTyping => 20,
            XpEvent::TranslationBase => 30,
            XpEvent::PerfectSession => 50,
            XpEvent::DailyGoalMet => 100,
            XpEvent::NewWordLearned => 25,
        }
    }
}

/// The scheduler's minimal per-card state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsCard {
    pub ease_factor: f64,
    /// Days until the next review.
    pub interval: i64,
    /// Consecutive correct reviews since the last lapse.
    pub repetitions: i32,
}

impl Default for SrsCard {
    fn default() -> Self {
        Self {
            ease_factor: DEFAULT_EASE_FACTOR,
            interval: 0,
            repetitions: 0,
        }
    }
}

/// Result of scheduling one review.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsResult {
    pub ease_factor: f64,
    pub interval: i64,
    pub repetitions: i32,
    pub next_review: DateTime<Utc>,
}

/// Full per-word learning record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordProgress {
    pub word_id: String,
    pub ease_factor: f64,
    pub interval: i64,
    pub repetitions: i32,
    /// Highest repetition count ever reached. Never decreases, even when
    /// `repetitions` resets on a lapse; backs the stable "learned" status.
    pub max_repetitions: i32,
    pub next_review: DateTime<Utc>,
    /// `None` means the word has never been reviewed.
    pub last_review: Option<DateTime<Utc>>,
    pub last_quality: i32,
    pub times_reviewed: i64,
    pub times_correct: i64,
}

/// Aggregate per-user progression record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub xp: i64,
    pub level: i32,
    pub streak: i32,
    pub longest_streak: i32,
    pub last_study_date: Option<DateTime<Utc>>,
    pub achievements: BTreeSet<String>,
    pub words_learned: i64,
    pub words_in_progress: i64,
    pub total_reviews: i64,
    pub correct_reviews: i64,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            streak: 0,
            longest_streak: 0,
            last_study_date: None,
            achievements: BTreeSet::new(),
            words_learned: 0,
            words_in_progress: 0,
            total_reviews: 0,
            correct_reviews: 0,
        }
    }
}

/// One day of study history, keyed elsewhere by a `YYYY-MM-DD` date string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub reviews: i64,
    pub words_learned: i64,
}

/// Midnight UTC of the given instant's calendar day.
pub(crate) fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.date_naive().and_time(NaiveTime::MIN).and_utc()
}
