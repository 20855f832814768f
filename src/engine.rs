//! The review pipeline: one study action, end to end.
//!
//! A review produces an updated per-word record and updated aggregate
//! stats in a single state transition ([`apply_review`]), which
//! [`StudyEngine`] then persists locally and mirrors to the remote store
//! through the sync queue. The transition itself is pure over
//! [`StoredState`] so it can be tested without any storage attached.

use std::sync::Arc;

use chrono::Utc;

use crate::srs::{create_initial_progress, update_word_progress};
use crate::storage::{KeyValueStore, StoreResult, StoredState, StudyStateStore};
use crate::sync::{OperationKind, SyncOperation, SyncQueue};
use crate::types::{WordProgress, XpEvent, LEARNED_REPETITIONS, PASSING_QUALITY};
use crate::xp::{award_xp, get_streak_multiplier, update_streak};

/// What one review changed.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub progress: WordProgress,
    pub xp_gained: i64,
    pub leveled_up: bool,
    /// False when the streak was already counted today.
    pub streak_changed: bool,
    /// The word's repetition high-water mark just crossed the
    /// "learned" threshold.
    pub newly_learned: bool,
}

/// Apply a review to the full study state.
///
/// Creates the word's progress record on first encounter. XP (scaled by
/// the streak multiplier) is awarded only for a passing quality; counters,
/// streak, and today's history entry are updated either way.
pub fn apply_review(
    state: &mut StoredState,
    word_id: &str,
    quality: f64,
    interval_modifier: f64,
    event: XpEvent,
) -> ReviewOutcome {
    let previous = state.progress.get(word_id).cloned();
    let is_new_word = previous.is_none();
    let before = previous.unwrap_or_else(|| create_initial_progress(word_id));
    let updated = update_word_progress(&before, quality, interval_modifier);

    let correct = updated.last_quality >= PASSING_QUALITY;
    let newly_learned = before.max_repetitions < LEARNED_REPETITIONS
        && updated.max_repetitions >= LEARNED_REPETITIONS;

    let streak_update = update_streak(&state.stats);
    let streak_changed = streak_update.changed;
    let mut stats = streak_update.stats;
    stats.total_reviews += 1;

    let (xp_gained, leveled_up) = if correct {
        stats.correct_reviews += 1;
        let multiplier = get_streak_multiplier(stats.streak);
        let award = award_xp(&stats, event, multiplier);
        let gained = award.xp_gained;
        let leveled = award.leveled_up;
        stats = award.new_stats;
        (gained, leveled)
    } else {
        (0, false)
    };

    if is_new_word {
        stats.words_in_progress += 1;
    }
    if newly_learned {
        stats.words_learned += 1;
        stats.words_in_progress = (stats.words_in_progress - 1).max(0);
    }

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let day = state.history.entry(today.clone()).or_default();
    day.reviews += 1;
    if newly_learned {
        day.words_learned += 1;
    }

    state.last_review_date = Some(today);
    state.stats = stats;
    state.progress.insert(word_id.to_string(), updated.clone());

    ReviewOutcome {
        progress: updated,
        xp_gained,
        leveled_up,
        streak_changed,
        newly_learned,
    }
}

/// Owns the durable store and the sync queue; the composition root builds
/// one of these and hands it to the UI layer.
pub struct StudyEngine<S: KeyValueStore + Send + Sync + 'static> {
    store: StudyStateStore<S>,
    queue: Arc<SyncQueue<S>>,
}

impl<S: KeyValueStore + Send + Sync + 'static> StudyEngine<S> {
    pub fn new(store: StudyStateStore<S>, queue: Arc<SyncQueue<S>>) -> Self {
        Self { store, queue }
    }

    /// Load the study state, repairing and migrating as needed.
    pub fn load(&self) -> StoreResult<StoredState> {
        Ok(self.store.load()?.state)
    }

    pub fn save(&self, state: &StoredState) -> StoreResult<()> {
        self.store.save(state)
    }

    pub fn queue(&self) -> &Arc<SyncQueue<S>> {
        &self.queue
    }

    /// Apply a review, persist the new state locally, and queue the
    /// caller-supplied remote persist. The local write is authoritative;
    /// the remote write is eventual and survives being offline.
    pub fn record_review(
        &self,
        state: &mut StoredState,
        word_id: &str,
        quality: f64,
        interval_modifier: f64,
        event: XpEvent,
        persist: SyncOperation,
    ) -> StoreResult<ReviewOutcome> {
        let outcome = apply_review(state, word_id, quality, interval_modifier, event);
        self.store.save(state)?;
        self.queue.enqueue(persist, OperationKind::Progress);
        Ok(outcome)
    }
}
