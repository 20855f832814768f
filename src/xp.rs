//! XP, levels, streaks, and multipliers.
//!
//! All functions are pure over [`UserStats`]; the only clock dependency is
//! `update_streak`, which compares calendar days in UTC.

use chrono::{Duration, Utc};

use crate::types::{start_of_day, UserStats, XpEvent, LEVEL_THRESHOLDS};

/// Streak multiplier never exceeds this, no matter how long the streak.
pub const MAX_STREAK_MULTIPLIER: f64 = 2.0;

/// Per-level XP growth factor used past the end of [`LEVEL_THRESHOLDS`].
const EXTRAPOLATION_GROWTH: f64 = 1.1;

/// Fresh all-zero stats at level 1.
pub fn create_initial_stats() -> UserStats {
    UserStats::default()
}

/// Level implied by a cumulative XP total.
///
/// The largest threshold at or below `xp` wins; negative XP is level 1 and
/// XP past the table stays at the maximum defined level.
pub fn calculate_level(xp: i64) -> i32 {
    let mut level = 1;
    for (index, threshold) in LEVEL_THRESHOLDS.iter().enumerate() {
        if xp >= *threshold {
            level = (index + 1) as i32;
        } else {
            break;
        }
    }
    level
}

/// Cumulative XP needed to finish the given level.
///
/// Inside the table this is a lookup; past it, the curve keeps growing
/// exponentially so there is always a next goal.
pub fn get_xp_for_next_level(level: i32) -> i64 {
    let level = level.max(1);
    let max_defined = LEVEL_THRESHOLDS.len() as i32;
    if level < max_defined {
        return LEVEL_THRESHOLDS[level as usize];
    }
    let last = LEVEL_THRESHOLDS[LEVEL_THRESHOLDS.len() - 1];
    let beyond = level - max_defined + 1;
    (last as f64 * EXTRAPOLATION_GROWTH.powi(beyond)).round() as i64
}

/// Percentage progress through the current level, `0..=100`.
/// Exactly 0 at a threshold; capped at 100.
pub fn get_level_progress(xp: i64) -> i32 {
    let xp = xp.max(0);
    let level = calculate_level(xp);
    let current = LEVEL_THRESHOLDS[(level - 1) as usize];
    let next = get_xp_for_next_level(level);
    if next <= current {
        return 100;
    }
    let pct = ((xp - current) as f64 / (next - current) as f64 * 100.0).round() as i32;
    pct.clamp(0, 100)
}

/// Outcome of an XP award.
#[derive(Debug, Clone, PartialEq)]
pub struct XpAward {
    pub new_stats: UserStats,
    pub xp_gained: i64,
    pub leveled_up: bool,
}

/// Award XP for a study event, scaled by a multiplier (e.g. the streak
/// bonus). Every other stats field passes through untouched.
pub fn award_xp(stats: &UserStats, event: XpEvent, multiplier: f64) -> XpAward {
    let multiplier = if multiplier.is_finite() && multiplier > 0.0 {
        multiplier
    } else {
        1.0
    };
    let xp_gained = (event.base_reward() as f64 * multiplier).round() as i64;
    let xp = (stats.xp + xp_gained).max(0);
    let new_level = calculate_level(xp);
    let leveled_up = new_level != calculate_level(stats.xp);

    let new_stats = UserStats {
        xp,
        level: new_level,
        ..stats.clone()
    };

    XpAward {
        new_stats,
        xp_gained,
        leveled_up,
    }
}

/// Result of a streak update. `changed == false` guarantees the returned
/// stats are field-for-field identical to the input (already studied
/// today), so callers can skip a redundant write.
#[derive(Debug, Clone, PartialEq)]
pub struct StreakUpdate {
    pub stats: UserStats,
    pub changed: bool,
}

/// Advance the daily streak for a study action happening now.
///
/// Same day: no-op. Exactly yesterday: streak continues. Anything else
/// (first session ever, or a gap of two or more days): streak restarts at 1.
pub fn update_streak(stats: &UserStats) -> StreakUpdate {
    let today = Utc::now().date_naive();
    let last = stats.last_study_date.map(|d| d.date_naive());

    if last == Some(today) {
        return StreakUpdate {
            stats: stats.clone(),
            changed: false,
        };
    }

    let yesterday = today - Duration::days(1);
    let streak = if last == Some(yesterday) {
        stats.streak + 1
    } else {
        1
    };

    let mut updated = stats.clone();
    updated.streak = streak;
    updated.longest_streak = stats.longest_streak.max(streak);
    updated.last_study_date = Some(start_of_day(Utc::now()));

    StreakUpdate {
        stats: updated,
        changed: true,
    }
}

/// XP multiplier earned by a daily streak.
///
/// 5% per day through the first week, 2% per day to day 30, then 1% per
/// day until the 2.0 cap (reached at day 54).
pub fn get_streak_multiplier(streak: i32) -> f64 {
    let streak = streak.max(0);
    let multiplier = match streak {
        0 | 1 => 1.0,
        2..=7 => 1.0 + 0.05 * (streak - 1) as f64,
        8..=30 => 1.3 + 0.02 * (streak - 7) as f64,
        _ => 1.76 + 0.01 * (streak - 30) as f64,
    };
    multiplier.min(MAX_STREAK_MULTIPLIER)
}

/// Display title for a level. Nine bands from Novice to Grandmaster.
pub fn get_level_title(level: i32) -> &'static str {
    match level {
        i32::MIN..=5 => "Novice",
        6..=10 => "Student",
        11..=15 => "Apprentice",
        16..=20 => "Scholar",
        21..=25 => "Adept",
        26..=30 => "Expert",
        31..=40 => "Master",
        41..=50 => "Sage",
        _ => "Grandmaster",
    }
}
