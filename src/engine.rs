//! Award orchestration
//!
//! [`GamificationService`] is the single entry point hosts call. Every
//! mutation inside `award_points` happens on one connection guard inside one
//! transaction: the point delta, the streak update, the level recompute, and
//! the achievement re-check either all land or none do.
//!
//! The re-check runs in passes instead of recursing: each pass marks every
//! newly satisfied achievement complete *before* applying the summed reward
//! XP, so a reward can level the user into further unlocks on the next pass
//! but can never re-trigger an achievement already marked complete. The
//! completed set only grows, which bounds the loop by the catalog size.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::activity;
use crate::catalog::{self, CatalogAchievement};
use crate::criteria;
use crate::db::GamificationDb;
use crate::levels;
use crate::models::{AwardOutcome, GamificationProfile};
use crate::profiles;
use crate::recorder::ActivityRecorder;
use crate::streaks;

/// Central service for all gamification operations
///
/// Thread-safe through the mutex on the database connection; clones share
/// the connection and the loaded catalog.
#[derive(Clone)]
pub struct GamificationService {
    pub(crate) db: GamificationDb,
    pub(crate) catalog: Vec<CatalogAchievement>,
}

impl GamificationService {
    /// Create a service over an already-opened store. Seeds the stock
    /// catalog into an empty `achievements` table, then loads and validates
    /// every criteria blob - a malformed catalog fails here, at startup.
    pub fn new(db: GamificationDb) -> Result<Self> {
        catalog::seed_defaults(&db)?;
        let catalog = catalog::load(&db)?;
        Ok(Self { db, catalog })
    }

    /// Open (or create) the store at the default location.
    pub fn open_default() -> Result<Self> {
        Self::new(GamificationDb::open_default()?)
    }

    /// Open (or create) the store at a specific path.
    pub fn open(path: &Path) -> Result<Self> {
        Self::new(GamificationDb::open(path)?)
    }

    /// Get a writer for the collaborator mirror tables.
    pub fn recorder(&self) -> ActivityRecorder {
        ActivityRecorder::new(self.db.clone())
    }

    /// The loaded achievement catalog.
    pub fn catalog(&self) -> &[CatalogAchievement] {
        &self.catalog
    }

    /// Delete one user's profile and earned achievements.
    pub fn reset_profile(&self, user_id: &str) -> Result<()> {
        self.db.reset_profile(user_id)
    }

    // ======== AWARDS ========

    /// Hand out points for an activity and run the full follow-up: streak,
    /// level, rank, and the achievement re-check.
    ///
    /// `activity_type` is a free-form label ("SessionCompleted",
    /// "DailyLogin", ...); unknown labels are accepted and logged as-is.
    /// Negative deltas are allowed but XP never drops below zero.
    pub fn award_points(
        &self,
        user_id: &str,
        activity_type: &str,
        points: i64,
        description: Option<&str>,
    ) -> Result<AwardOutcome> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let now = Utc::now();
        let mut profile = profiles::get_or_create(&tx, user_id, &self.catalog)?;

        // Saturating: a delta near i64::MAX must pin at the ceiling, not wrap
        profile.xp = profile.xp.saturating_add(points).max(0);

        // Streak first, against the stamp as it was before this award
        profile.streak_count =
            streaks::next_streak(profile.streak_count, profile.last_activity_at, now);
        profile.last_activity_at = now.timestamp_millis();

        let old_level = profile.level;
        profile.level = levels::level_for_xp(profile.xp);
        profile.rank = levels::rank_for_level(profile.level).to_string();
        let mut new_level = (profile.level > old_level).then_some(profile.level);

        profiles::save(&tx, &profile)?;

        info!(
            "Awarded {} points to {} for {}{}",
            points,
            user_id,
            activity_type,
            description.map(|d| format!(" ({d})")).unwrap_or_default()
        );

        let unlocked = self.run_unlock_passes(&tx, &mut profile, &mut new_level)?;

        tx.commit()?;

        let mut message = format!("You earned {points} XP");
        if let Some(level) = new_level {
            message.push_str(&format!(" and reached level {level}"));
        }
        if !unlocked.is_empty() {
            message.push_str(&format!(
                " and unlocked {} achievement{}",
                unlocked.len(),
                if unlocked.len() == 1 { "" } else { "s" }
            ));
        }

        Ok(AwardOutcome {
            success: true,
            points_awarded: points,
            new_level,
            unlocked_achievements: unlocked,
            message,
        })
    }

    // ======== ACHIEVEMENT RE-CHECK ========

    /// Re-evaluate the whole catalog for a user outside of an award (role
    /// changes, backfilled bookings). Reward XP from unlocks is applied the
    /// same way `award_points` does it. Returns newly unlocked names.
    pub fn check_and_award(&self, user_id: &str) -> Result<Vec<String>> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let mut profile = profiles::get_or_create(&tx, user_id, &self.catalog)?;
        let mut new_level = None;
        let unlocked = self.run_unlock_passes(&tx, &mut profile, &mut new_level)?;

        tx.commit()?;
        Ok(unlocked)
    }

    /// Evaluate a single achievement for a user without persisting anything.
    /// Unknown achievement ids and absent users evaluate to false.
    pub fn test_achievement_criteria(&self, user_id: &str, achievement_id: i64) -> Result<bool> {
        let Some(achievement) = self.catalog.iter().find(|a| a.id == achievement_id) else {
            return Ok(false);
        };

        let conn = self.db.conn();
        let profile = profiles::get(&conn, user_id)?
            .unwrap_or_else(|| GamificationProfile::fresh(user_id, Utc::now().timestamp_millis()));
        let snapshot = activity::snapshot(&conn, user_id)?;

        Ok(criteria::evaluate(
            achievement.category,
            &achievement.criteria,
            &profile,
            &snapshot,
        ))
    }

    /// Evaluate-collect-apply loop. Each pass attaches every satisfied
    /// achievement, then applies the pass's summed reward in one go; the
    /// next pass sees the new XP/level. Stops when a pass awards nothing.
    fn run_unlock_passes(
        &self,
        conn: &Connection,
        profile: &mut GamificationProfile,
        new_level: &mut Option<u32>,
    ) -> Result<Vec<String>> {
        let mut unlocked_names = Vec::new();

        loop {
            let completed: HashSet<i64> = profiles::earned(conn, &profile.user_id)?
                .iter()
                .filter(|e| e.progress >= 100)
                .map(|e| e.achievement_id)
                .collect();
            let snapshot = activity::snapshot(conn, &profile.user_id)?;
            let now_ms = Utc::now().timestamp_millis();

            let mut pass_reward = 0i64;
            let mut pass_unlocks = 0usize;
            for achievement in &self.catalog {
                if completed.contains(&achievement.id) {
                    continue;
                }
                if !criteria::evaluate(achievement.category, &achievement.criteria, profile, &snapshot)
                {
                    continue;
                }
                if profiles::attach_achievement(conn, &profile.user_id, achievement.id, now_ms)? {
                    info!(
                        "Achievement unlocked: {:?} (+{} XP) for {}",
                        achievement.name, achievement.reward_points, profile.user_id
                    );
                    unlocked_names.push(achievement.name.clone());
                    pass_reward += achievement.reward_points;
                    pass_unlocks += 1;
                }
            }

            if pass_unlocks == 0 {
                break;
            }

            // Criteria read XP, level, streak, and the mirror tables; a pass
            // that unlocked only zero-reward achievements cannot satisfy
            // anything new, so stop without another sweep.
            if pass_reward == 0 {
                break;
            }

            info!(
                "Awarded {} points to {} for AchievementEarned",
                pass_reward, profile.user_id
            );
            profile.xp = profile.xp.saturating_add(pass_reward).max(0);
            let before = profile.level;
            profile.level = levels::level_for_xp(profile.xp);
            profile.rank = levels::rank_for_level(profile.level).to_string();
            if profile.level > before {
                *new_level = Some(profile.level);
                debug!(
                    "Reward XP pushed {} to level {}",
                    profile.user_id, profile.level
                );
            }
            profiles::save(conn, profile)?;
        }

        Ok(unlocked_names)
    }
}
