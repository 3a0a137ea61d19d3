//! XP and level system
//!
//! Levels follow a square-root curve: `level = floor(sqrt(xp / 100)) + 1`,
//! which makes each level cost more than the last (level n starts at
//! `100 * (n - 1)^2` XP). Ranks are coarse bands over levels.

/// Level for a given XP total. Never below 1; negative XP is treated as 0.
pub fn level_for_xp(xp: i64) -> u32 {
    if xp <= 0 {
        return 1;
    }
    (xp as f64 / 100.0).sqrt() as u32 + 1
}

/// XP needed to *enter* the given level: `100 * (level - 1)^2`.
/// Level 1 starts at 0. Saturates at `i64::MAX` once the square leaves the
/// `i64` range, so a maxed-out profile still reads cleanly.
pub fn xp_threshold(level: u32) -> i64 {
    let n = i64::from(level.saturating_sub(1));
    (100 * n).saturating_mul(n)
}

/// Rank title for a level.
pub fn rank_for_level(level: u32) -> &'static str {
    match level {
        0..=4 => "Beginner",
        5..=9 => "Intermediate",
        10..=14 => "Advanced",
        15..=19 => "Expert",
        _ => "Master",
    }
}

/// XP still missing until the next level threshold.
pub fn points_to_next_level(xp: i64) -> i64 {
    let next = xp_threshold(level_for_xp(xp) + 1);
    next - xp.max(0)
}

/// Progress through the current level band, clamped to 0.0-1.0.
pub fn level_progress(xp: i64) -> f64 {
    let level = level_for_xp(xp);
    let floor = xp_threshold(level);
    let ceiling = xp_threshold(level + 1);
    let span = ceiling - floor;
    if span <= 0 {
        return 0.0;
    }
    (((xp.max(0) - floor) as f64) / (span as f64)).clamp(0.0, 1.0)
}
