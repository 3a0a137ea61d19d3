//! SQLite connection and schema management for the gamification store
//!
//! One database holds both the engine-owned tables (profiles, achievements,
//! user_achievements) and the collaborator mirror the criteria read from
//! (users, bookings, reviews). Default location is
//! `~/.tutorquest/gamification.db`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Database wrapper with a single shared connection
///
/// All writes go through the one connection behind the mutex, which is what
/// makes award transactions single-writer without any further locking.
#[derive(Clone)]
pub struct GamificationDb {
    /// Connection - pub(crate) so the service can run transactions on it
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl GamificationDb {
    /// Open or create the database at the default location
    /// (`~/.tutorquest/gamification.db`)
    pub fn open_default() -> Result<Self> {
        Self::open(&default_db_path()?)
    }

    /// Open or create the database at a specific path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create gamification dir: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open gamification db: {}", path.display()))?;

        // WAL so profile-page reads do not block award writes
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (unit tests)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory db")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Get the connection guard. Held for the duration of one operation.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("Gamification DB lock poisoned")
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA_SQL)?;
        drop(conn);
        self.run_migrations()?;
        Ok(())
    }

    /// Run any pending migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn();

        let version: i32 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))
            .unwrap_or(0);

        // Migration 2: streak columns on profiles (pre-streak installs)
        if version < 2 {
            let has_streak: bool = conn
                .prepare("SELECT COUNT(*) FROM pragma_table_info('profiles') WHERE name = 'streak_count'")
                .and_then(|mut s| s.query_row([], |r| r.get::<_, i32>(0)))
                .map(|c| c > 0)
                .unwrap_or(false);

            if !has_streak {
                conn.execute_batch(
                    r#"
                    ALTER TABLE profiles ADD COLUMN streak_count INTEGER NOT NULL DEFAULT 0;
                    ALTER TABLE profiles ADD COLUMN last_activity_at INTEGER NOT NULL DEFAULT 0;
                    "#,
                )?;
            }

            conn.execute("INSERT OR REPLACE INTO schema_version VALUES (2)", [])?;
        }

        Ok(())
    }

    /// Delete one user's gamification state (profile + earned achievements)
    /// in a single transaction. The collaborator mirror is left untouched.
    pub fn reset_profile(&self, user_id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM user_achievements WHERE user_id = ?1", [user_id])?;
        tx.execute("DELETE FROM profiles WHERE user_id = ?1", [user_id])?;
        tx.commit()?;
        Ok(())
    }
}

fn default_db_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not resolve home directory")?;
    Ok(home.join(".tutorquest").join("gamification.db"))
}

/// SQL schema for the gamification database
const SCHEMA_SQL: &str = r#"
-- Platform users the engine resolves roles from
CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    role TEXT NOT NULL,
    role_id INTEGER NOT NULL
);

-- Tutoring sessions mirrored from the booking system
CREATE TABLE IF NOT EXISTS bookings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL,
    tutor_id INTEGER NOT NULL,
    module_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    notes TEXT,
    end_time INTEGER
);
CREATE INDEX IF NOT EXISTS idx_bookings_student ON bookings(student_id);
CREATE INDEX IF NOT EXISTS idx_bookings_tutor ON bookings(tutor_id);
CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status);

-- Tutor reviews mirrored from the review system
CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tutor_id INTEGER NOT NULL,
    rating INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reviews_tutor ON reviews(tutor_id);

-- ============================================
-- ENGINE-OWNED TABLES
-- ============================================

-- Achievement catalog (seeded once, treated as immutable at runtime)
CREATE TABLE IF NOT EXISTS achievements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    icon_url TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL,
    reward_points INTEGER NOT NULL DEFAULT 0,
    criteria TEXT NOT NULL
);

-- One gamification profile per user
CREATE TABLE IF NOT EXISTS profiles (
    user_id TEXT PRIMARY KEY,
    xp INTEGER NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 1,
    rank TEXT NOT NULL DEFAULT 'Beginner',
    streak_count INTEGER NOT NULL DEFAULT 0,
    last_activity_at INTEGER NOT NULL DEFAULT 0
);

-- Earned achievements; the composite key is what makes unlocks at-most-once
CREATE TABLE IF NOT EXISTS user_achievements (
    user_id TEXT NOT NULL,
    achievement_id INTEGER NOT NULL,
    earned_at INTEGER NOT NULL,
    progress INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, achievement_id)
);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
INSERT OR IGNORE INTO schema_version VALUES (2);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_and_init() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test_gamification.db");
        let db = GamificationDb::open(&db_path).unwrap();

        // Verify tables exist
        let conn = db.conn();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"profiles".to_string()));
        assert!(tables.contains(&"achievements".to_string()));
        assert!(tables.contains(&"user_achievements".to_string()));
        assert!(tables.contains(&"bookings".to_string()));
        assert!(tables.contains(&"reviews".to_string()));
        assert!(tables.contains(&"users".to_string()));
    }

    #[test]
    fn test_open_in_memory() {
        let db = GamificationDb::open_in_memory().unwrap();
        let conn = db.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_reset_profile_keeps_mirror() {
        let db = GamificationDb::open_in_memory().unwrap();
        {
            let conn = db.conn();
            conn.execute(
                "INSERT INTO profiles (user_id, xp, level, rank) VALUES ('u-1', 500, 3, 'Beginner')",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO user_achievements (user_id, achievement_id, earned_at, progress)
                 VALUES ('u-1', 1, 1000, 100)",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO users (user_id, role, role_id) VALUES ('u-1', 'student', 7)",
                [],
            )
            .unwrap();
        }

        db.reset_profile("u-1").unwrap();

        // Profile and earned rows go together; the mirror stays
        let conn = db.conn();
        let profiles: i64 = conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |r| r.get(0))
            .unwrap();
        let earned: i64 = conn
            .query_row("SELECT COUNT(*) FROM user_achievements", [], |r| r.get(0))
            .unwrap();
        let users: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        assert_eq!(profiles, 0);
        assert_eq!(earned, 0);
        assert_eq!(users, 1);
    }
}
