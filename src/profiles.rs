//! Profile persistence
//!
//! Row-level reads and writes for profiles and earned achievements. Every
//! function takes the caller's `Connection` so the award path can run all of
//! its steps inside one transaction on the already-held guard.

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::catalog::{self, CatalogAchievement};
use crate::models::{EarnedAchievement, GamificationProfile, LeaderboardEntry};

pub fn get(conn: &Connection, user_id: &str) -> Result<Option<GamificationProfile>> {
    let profile = conn
        .query_row(
            "SELECT user_id, xp, level, rank, streak_count, last_activity_at
             FROM profiles WHERE user_id = ?1",
            [user_id],
            |row| {
                Ok(GamificationProfile {
                    user_id: row.get(0)?,
                    xp: row.get(1)?,
                    level: row.get(2)?,
                    rank: row.get(3)?,
                    streak_count: row.get(4)?,
                    last_activity_at: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(profile)
}

/// Fetch a profile, creating it on first contact. A new profile starts at
/// zero XP with the streak unstarted, and gets the onboarding badge attached
/// (badge only - its reward points are not granted here).
pub fn get_or_create(
    conn: &Connection,
    user_id: &str,
    catalog: &[CatalogAchievement],
) -> Result<GamificationProfile> {
    if let Some(profile) = get(conn, user_id)? {
        return Ok(profile);
    }

    let now_ms = Utc::now().timestamp_millis();
    let profile = GamificationProfile::fresh(user_id, now_ms);
    conn.execute(
        "INSERT INTO profiles (user_id, xp, level, rank, streak_count, last_activity_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            profile.user_id,
            profile.xp,
            profile.level,
            profile.rank,
            profile.streak_count,
            profile.last_activity_at,
        ],
    )?;

    if let Some(welcome) = catalog.iter().find(|a| a.name == catalog::GETTING_STARTED) {
        attach_achievement(conn, user_id, welcome.id, now_ms)?;
        info!("Granted {:?} to new profile {}", welcome.name, user_id);
    }

    Ok(profile)
}

/// Write back a profile's mutable fields.
pub fn save(conn: &Connection, profile: &GamificationProfile) -> Result<()> {
    conn.execute(
        "UPDATE profiles
         SET xp = ?2, level = ?3, rank = ?4, streak_count = ?5, last_activity_at = ?6
         WHERE user_id = ?1",
        params![
            profile.user_id,
            profile.xp,
            profile.level,
            profile.rank,
            profile.streak_count,
            profile.last_activity_at,
        ],
    )?;
    Ok(())
}

/// Mark an achievement earned at full progress. Returns true when this call
/// completed it; an already-completed row is left untouched, which is what
/// makes repeated unlock attempts harmless.
pub fn attach_achievement(
    conn: &Connection,
    user_id: &str,
    achievement_id: i64,
    earned_at: i64,
) -> Result<bool> {
    let changed = conn.execute(
        "INSERT INTO user_achievements (user_id, achievement_id, earned_at, progress)
         VALUES (?1, ?2, ?3, 100)
         ON CONFLICT(user_id, achievement_id) DO UPDATE SET
             progress = 100,
             earned_at = excluded.earned_at
         WHERE user_achievements.progress < 100",
        params![user_id, achievement_id, earned_at],
    )?;
    Ok(changed > 0)
}

/// All earned achievement rows for a user, newest first.
pub fn earned(conn: &Connection, user_id: &str) -> Result<Vec<EarnedAchievement>> {
    let mut stmt = conn.prepare(
        "SELECT achievement_id, earned_at, progress
         FROM user_achievements WHERE user_id = ?1
         ORDER BY earned_at DESC",
    )?;
    let rows: Vec<EarnedAchievement> = stmt
        .query_map([user_id], |row| {
            Ok(EarnedAchievement {
                achievement_id: row.get(0)?,
                earned_at: row.get(1)?,
                progress: row.get(2)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

/// Top profiles by XP. Ties break on user id so the ordering is stable.
pub fn leaderboard(conn: &Connection, limit: usize) -> Result<Vec<LeaderboardEntry>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, xp, level, rank, streak_count
         FROM profiles ORDER BY xp DESC, user_id ASC LIMIT ?1",
    )?;
    let rows: Vec<LeaderboardEntry> = stmt
        .query_map([limit], |row| {
            Ok(LeaderboardEntry {
                user_id: row.get(0)?,
                xp: row.get(1)?,
                level: row.get(2)?,
                rank: row.get(3)?,
                streak: row.get(4)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::GamificationDb;

    fn seeded_db() -> (GamificationDb, Vec<CatalogAchievement>) {
        let db = GamificationDb::open_in_memory().unwrap();
        catalog::seed_defaults(&db).unwrap();
        let loaded = catalog::load(&db).unwrap();
        (db, loaded)
    }

    #[test]
    fn test_get_or_create_grants_onboarding_badge() {
        let (db, loaded) = seeded_db();
        let conn = db.conn();

        let profile = get_or_create(&conn, "u-1", &loaded).unwrap();
        assert_eq!(profile.xp, 0);
        assert_eq!(profile.level, 1);
        assert_eq!(profile.streak_count, 0);

        let rows = earned(&conn, "u-1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].progress, 100);

        // Badge does not come with points
        let stored = get(&conn, "u-1").unwrap().unwrap();
        assert_eq!(stored.xp, 0);
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let (db, loaded) = seeded_db();
        let conn = db.conn();

        get_or_create(&conn, "u-1", &loaded).unwrap();
        get_or_create(&conn, "u-1", &loaded).unwrap();

        let profiles: i64 = conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |r| r.get(0))
            .unwrap();
        assert_eq!(profiles, 1);
        assert_eq!(earned(&conn, "u-1").unwrap().len(), 1);
    }

    #[test]
    fn test_attach_achievement_at_most_once() {
        let (db, loaded) = seeded_db();
        let conn = db.conn();
        get_or_create(&conn, "u-1", &loaded).unwrap();
        let target = loaded.iter().find(|a| a.name == "First Session").unwrap();

        assert!(attach_achievement(&conn, "u-1", target.id, 1000).unwrap());
        assert!(!attach_achievement(&conn, "u-1", target.id, 2000).unwrap());

        let rows = earned(&conn, "u-1").unwrap();
        let row = rows
            .iter()
            .find(|e| e.achievement_id == target.id)
            .unwrap();
        // First completion timestamp survives the repeat
        assert_eq!(row.earned_at, 1000);
    }

    #[test]
    fn test_attach_completes_partial_row() {
        let (db, loaded) = seeded_db();
        let conn = db.conn();
        get_or_create(&conn, "u-1", &loaded).unwrap();
        let target = loaded.iter().find(|a| a.name == "Regular").unwrap();

        conn.execute(
            "INSERT INTO user_achievements (user_id, achievement_id, earned_at, progress)
             VALUES ('u-1', ?1, 500, 40)",
            [target.id],
        )
        .unwrap();

        // Completing a partial row counts as newly earned
        assert!(attach_achievement(&conn, "u-1", target.id, 900).unwrap());
        let rows = earned(&conn, "u-1").unwrap();
        let row = rows
            .iter()
            .find(|e| e.achievement_id == target.id)
            .unwrap();
        assert_eq!(row.progress, 100);
        assert_eq!(row.earned_at, 900);
    }

    #[test]
    fn test_leaderboard_order() {
        let (db, loaded) = seeded_db();
        let conn = db.conn();
        for (user, xp) in [("u-a", 300), ("u-b", 900), ("u-c", 300)] {
            let mut p = get_or_create(&conn, user, &loaded).unwrap();
            p.xp = xp;
            save(&conn, &p).unwrap();
        }

        let board = leaderboard(&conn, 10).unwrap();
        let ids: Vec<&str> = board.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u-b", "u-a", "u-c"]);
    }
}
