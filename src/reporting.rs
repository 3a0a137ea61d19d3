//! Derived reporting: profile view, XP breakdown, activity feed, leaderboard
//!
//! There is no award ledger; everything here is re-derived from the profile,
//! the earned achievements, and the mirror tables at call time. Breakdown
//! buckets and feed point values are estimates of where XP came from, not a
//! transcript with arithmetic guarantees.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::error;

use crate::activity;
use crate::engine::GamificationService;
use crate::levels;
use crate::models::{
    AchievementView, ActivityEntry, EarnedAchievement, GamificationProfile, LeaderboardEntry,
    ProfileView, UserRole, XpBreakdown,
};
use crate::profiles;

/// Estimated XP value of one completed session.
const SESSION_XP_ESTIMATE: i64 = 50;
/// Estimated XP per consecutive login day.
const DAILY_LOGIN_XP: i64 = 10;
/// Estimated XP bonus per five-star review.
const FIVE_STAR_BONUS_XP: i64 = 25;
/// How far back the activity feed reaches.
const ACTIVITY_WINDOW_DAYS: i64 = 30;
/// Maximum entries in the activity feed.
const ACTIVITY_FEED_LIMIT: usize = 10;

impl GamificationService {
    // ======== PROFILE PAGE ========

    /// Full profile view for one user, creating the profile on first
    /// contact. This is the one read that never fails: if the store cannot
    /// be read the caller gets a default level-1 view and the error goes to
    /// the log, so the profile page always renders.
    pub fn get_profile(&self, user_id: &str) -> ProfileView {
        match self.load_profile_view(user_id) {
            Ok(view) => view,
            Err(e) => {
                error!("Profile read for {} failed, serving default view: {:#}", user_id, e);
                ProfileView::fallback(user_id)
            }
        }
    }

    fn load_profile_view(&self, user_id: &str) -> Result<ProfileView> {
        let mut conn = self.db.conn();
        // First contact creates the profile, so this read is a write
        let tx = conn.transaction()?;
        let profile = profiles::get_or_create(&tx, user_id, &self.catalog)?;
        let earned = profiles::earned(&tx, user_id)?;
        tx.commit()?;

        let achievements = earned
            .iter()
            .filter_map(|row| {
                self.catalog
                    .iter()
                    .find(|a| a.id == row.achievement_id)
                    .map(|a| AchievementView {
                        name: a.name.clone(),
                        description: a.description.clone(),
                        icon_url: a.icon_url.clone(),
                        earned_at: Some(row.earned_at),
                        progress: row.progress,
                        is_completed: row.progress >= 100,
                    })
            })
            .collect();

        Ok(ProfileView {
            user_id: profile.user_id.clone(),
            xp: profile.xp,
            level: profile.level,
            rank: profile.rank.clone(),
            streak: profile.streak_count,
            points_to_next_level: levels::points_to_next_level(profile.xp),
            level_progress: levels::level_progress(profile.xp),
            achievements,
        })
    }

    /// Every catalog achievement with the user's earned state folded in
    /// (the badge wall: locked badges included).
    pub fn list_achievements(&self, user_id: &str) -> Result<Vec<AchievementView>> {
        let conn = self.db.conn();
        let earned: HashMap<i64, EarnedAchievement> = profiles::earned(&conn, user_id)?
            .into_iter()
            .map(|row| (row.achievement_id, row))
            .collect();

        Ok(self
            .catalog
            .iter()
            .map(|a| {
                let row = earned.get(&a.id);
                AchievementView {
                    name: a.name.clone(),
                    description: a.description.clone(),
                    icon_url: a.icon_url.clone(),
                    earned_at: row.map(|r| r.earned_at),
                    progress: row.map(|r| r.progress).unwrap_or(0),
                    is_completed: row.is_some_and(|r| r.progress >= 100),
                }
            })
            .collect())
    }

    // ======== XP BREAKDOWN ========

    /// Estimated split of the user's XP by source. Buckets are derived from
    /// current counts (sessions x 50, earned rewards, streak x 10, five-star
    /// reviews x 25); whatever they cannot explain lands in `other`, floored
    /// at zero. Unknown users get an all-zero breakdown.
    pub fn get_xp_breakdown(&self, user_id: &str) -> Result<XpBreakdown> {
        let conn = self.db.conn();
        let Some(profile) = profiles::get(&conn, user_id)? else {
            return Ok(XpBreakdown::default());
        };
        let snapshot = activity::snapshot(&conn, user_id)?;

        let sessions = snapshot.completed_sessions * SESSION_XP_ESTIMATE;
        let achievements = self.earned_reward_total(&conn, user_id)?;
        let daily_login = i64::from(profile.streak_count) * DAILY_LOGIN_XP;
        let bonuses = snapshot.five_star_reviews * FIVE_STAR_BONUS_XP;
        let other = (profile.xp - sessions - achievements - daily_login - bonuses).max(0);

        Ok(XpBreakdown {
            sessions,
            achievements,
            daily_login,
            bonuses,
            other,
            total: profile.xp,
        })
    }

    /// Sum of reward points over completed achievements.
    fn earned_reward_total(&self, conn: &Connection, user_id: &str) -> Result<i64> {
        Ok(profiles::earned(conn, user_id)?
            .iter()
            .filter(|row| row.progress >= 100)
            .filter_map(|row| self.catalog.iter().find(|a| a.id == row.achievement_id))
            .map(|a| a.reward_points)
            .sum())
    }

    // ======== ACTIVITY FEED ========

    /// Reconstructed feed of the user's last 30 days: completed sessions,
    /// earned achievements, streak logins, and five-star reviews, newest
    /// first, capped at 10 entries. Unknown users get an empty feed.
    pub fn get_recent_activity(&self, user_id: &str) -> Result<Vec<ActivityEntry>> {
        let conn = self.db.conn();
        let Some(profile) = profiles::get(&conn, user_id)? else {
            return Ok(Vec::new());
        };

        let now = Utc::now();
        let cutoff_ms = (now - Duration::days(ACTIVITY_WINDOW_DAYS)).timestamp_millis();
        let mut entries = Vec::new();

        self.collect_session_entries(&conn, user_id, cutoff_ms, &mut entries)?;
        self.collect_achievement_entries(&conn, user_id, cutoff_ms, &mut entries)?;
        collect_login_entries(&profile, now, &mut entries);
        self.collect_review_entries(&conn, user_id, cutoff_ms, &mut entries)?;

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(ACTIVITY_FEED_LIMIT);
        Ok(entries)
    }

    fn collect_session_entries(
        &self,
        conn: &Connection,
        user_id: &str,
        cutoff_ms: i64,
        out: &mut Vec<ActivityEntry>,
    ) -> Result<()> {
        let Some((role, role_id)) = activity::lookup_role(conn, user_id)? else {
            return Ok(());
        };
        let side = activity::side_column(role);
        let sql = format!(
            "SELECT module_id, end_time FROM bookings
             WHERE {side} = ?1 AND status = 'Completed'
               AND end_time IS NOT NULL AND end_time >= ?2
             ORDER BY end_time DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![role_id, cutoff_ms], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows.filter_map(|r| r.ok()) {
            let (module_id, end_time) = row;
            out.push(ActivityEntry {
                kind: "SessionCompleted".to_string(),
                description: format!("Completed a tutoring session (module {module_id})"),
                points: SESSION_XP_ESTIMATE,
                timestamp: end_time,
                icon: "book".to_string(),
                color: "primary".to_string(),
            });
        }
        Ok(())
    }

    fn collect_achievement_entries(
        &self,
        conn: &Connection,
        user_id: &str,
        cutoff_ms: i64,
        out: &mut Vec<ActivityEntry>,
    ) -> Result<()> {
        for row in profiles::earned(conn, user_id)? {
            if row.earned_at < cutoff_ms || row.progress < 100 {
                continue;
            }
            if let Some(a) = self.catalog.iter().find(|c| c.id == row.achievement_id) {
                out.push(ActivityEntry {
                    kind: "AchievementEarned".to_string(),
                    description: format!("Earned achievement: {}", a.name),
                    points: a.reward_points,
                    timestamp: row.earned_at,
                    icon: "trophy".to_string(),
                    color: "warning".to_string(),
                });
            }
        }
        Ok(())
    }

    fn collect_review_entries(
        &self,
        conn: &Connection,
        user_id: &str,
        cutoff_ms: i64,
        out: &mut Vec<ActivityEntry>,
    ) -> Result<()> {
        let Some((UserRole::Tutor, tutor_id)) = activity::lookup_role(conn, user_id)? else {
            return Ok(());
        };
        let mut stmt = conn.prepare(
            "SELECT created_at FROM reviews
             WHERE tutor_id = ?1 AND rating = 5 AND created_at >= ?2
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(rusqlite::params![tutor_id, cutoff_ms], |row| {
            row.get::<_, i64>(0)
        })?;

        for created_at in rows.filter_map(|r| r.ok()) {
            out.push(ActivityEntry {
                kind: "FiveStarReview".to_string(),
                description: "Received a 5-star review".to_string(),
                points: FIVE_STAR_BONUS_XP,
                timestamp: created_at,
                icon: "star".to_string(),
                color: "success".to_string(),
            });
        }
        Ok(())
    }

    // ======== LEADERBOARD ========

    /// Top profiles by XP.
    pub fn get_leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let conn = self.db.conn();
        profiles::leaderboard(&conn, limit)
    }
}

/// One feed entry per streak day. The streak counter is the only record of
/// logins, so the timestamps are reconstructed backwards from now.
fn collect_login_entries(
    profile: &GamificationProfile,
    now: DateTime<Utc>,
    out: &mut Vec<ActivityEntry>,
) {
    let days = i64::from(profile.streak_count).min(ACTIVITY_WINDOW_DAYS);
    for day in 0..days {
        out.push(ActivityEntry {
            kind: "DailyLogin".to_string(),
            description: "Daily login bonus".to_string(),
            points: DAILY_LOGIN_XP,
            timestamp: (now - Duration::days(day)).timestamp_millis(),
            icon: "calendar-check".to_string(),
            color: "success".to_string(),
        });
    }
}
