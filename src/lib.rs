//! # lashon-core — study scheduling and state durability
//!
//! The engine behind a Hebrew vocabulary study app: it decides when each
//! word is next due, keeps the learner's progress internally consistent
//! across sessions no matter what is on disk, and mirrors local changes
//! to a remote store even when connectivity comes and goes.
//!
//! ## Modules
//!
//! - [`types`] — record types (`WordProgress`, `UserStats`, history) and
//!   progression constants
//! - [`srs`] — SM-2 scheduler: review transitions, due filtering, mastery
//! - [`xp`] — XP awards, levels, streaks, and multipliers
//! - [`sanitize`] — total repair of arbitrary persisted JSON into valid
//!   records
//! - [`storage`] — the key-value store contract, the versioned persisted
//!   schema, and migration
//! - [`sync`] — the offline sync queue for remote writes
//! - [`engine`] — the review pipeline tying the above together
//!
//! ## Example
//!
//! ```rust
//! use lashon_core::srs::{create_initial_progress, update_word_progress};
//!
//! let fresh = create_initial_progress("shalom");
//! let reviewed = update_word_progress(&fresh, 4.0, 1.0);
//! assert_eq!(reviewed.interval, 1);
//! assert_eq!(reviewed.repetitions, 1);
//! assert_eq!(reviewed.times_correct, 1);
//! ```
//!
//! This crate has no process entry point; a UI layer supplies the
//! key-value store, the connectivity signal, and the remote persist
//! callables, and consumes the records read-only for display.

pub mod engine;
pub mod sanitize;
pub mod srs;
pub mod storage;
pub mod sync;
pub mod types;
pub mod xp;

pub use types::{
    DailyActivity, SrsCard, SrsResult, UserStats, WordProgress, XpEvent, DEFAULT_EASE_FACTOR,
    LEVEL_THRESHOLDS, MAX_EASE_FACTOR, MIN_EASE_FACTOR,
};

pub use srs::{
    button_intervals, calculate_mastery, calculate_next_review, create_initial_progress,
    get_due_words, is_due, update_word_progress, ReviewButton,
};

pub use xp::{
    award_xp, calculate_level, create_initial_stats, get_level_progress, get_level_title,
    get_streak_multiplier, get_xp_for_next_level, update_streak, StreakUpdate, XpAward,
};

pub use sanitize::{
    sanitize_progress, sanitize_study_history, sanitize_user_stats, sanitize_word_progress,
    Sanitized,
};

pub use storage::{
    migrate_last_review_date, needs_migration, KeyValueStore, LoadOutcome, MemoryStore,
    StoreError, StoreResult, StoredState, StudyStateStore,
};

pub use sync::{
    operation, sync_with_fallback, wait_for_online, OperationKind, SyncError, SyncOperation,
    SyncQueue, SyncQueueConfig, SyncQueueStatus,
};

pub use engine::{apply_review, ReviewOutcome, StudyEngine};
