//! Live activity counts for criteria evaluation
//!
//! Snapshots are recomputed from the mirror tables on every evaluation pass;
//! nothing here is cached, so an unlock can never fire off stale counts.
//! Only bookings with status `Completed` count.

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::models::UserRole;

/// Per-user activity numbers as of one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct ActivitySnapshot {
    /// None when the user is missing from the mirror; every count stays 0.
    pub role: Option<UserRole>,
    pub completed_sessions: i64,
    /// Completed sessions in the user's busiest module.
    pub top_module_sessions: i64,
    pub distinct_modules: i64,
    /// Tutors only.
    pub five_star_reviews: i64,
    /// Tutors only; None until the first review lands.
    pub average_rating: Option<f64>,
    /// Tutors only.
    pub distinct_students: i64,
    /// Students only: completed sessions with non-empty notes.
    pub sessions_with_notes: i64,
}

/// Build the snapshot for one user.
pub fn snapshot(conn: &Connection, user_id: &str) -> Result<ActivitySnapshot> {
    let Some((role, role_id)) = lookup_role(conn, user_id)? else {
        return Ok(ActivitySnapshot::default());
    };

    let side = side_column(role);
    let mut snap = ActivitySnapshot {
        role: Some(role),
        completed_sessions: completed_sessions(conn, side, role_id)?,
        top_module_sessions: top_module_sessions(conn, side, role_id)?,
        distinct_modules: distinct_modules(conn, side, role_id)?,
        ..Default::default()
    };

    match role {
        UserRole::Student => {
            snap.sessions_with_notes = sessions_with_notes(conn, role_id)?;
        }
        UserRole::Tutor => {
            snap.five_star_reviews = five_star_reviews(conn, role_id)?;
            snap.average_rating = average_rating(conn, role_id)?;
            snap.distinct_students = distinct_students(conn, role_id)?;
        }
    }

    Ok(snap)
}

/// Resolve a user's role and the numeric id bookings reference. Unknown
/// role strings are treated the same as a missing user.
pub fn lookup_role(conn: &Connection, user_id: &str) -> Result<Option<(UserRole, i64)>> {
    let row = conn
        .query_row(
            "SELECT role, role_id FROM users WHERE user_id = ?1",
            [user_id],
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)),
        )
        .optional()?;
    Ok(row.and_then(|(role, role_id)| UserRole::from_str(&role).map(|r| (r, role_id))))
}

/// Booking column a role's sessions hang off.
pub fn side_column(role: UserRole) -> &'static str {
    match role {
        UserRole::Student => "student_id",
        UserRole::Tutor => "tutor_id",
    }
}

fn completed_sessions(conn: &Connection, side: &str, role_id: i64) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM bookings WHERE {side} = ?1 AND status = 'Completed'");
    Ok(conn.query_row(&sql, [role_id], |r| r.get(0))?)
}

fn top_module_sessions(conn: &Connection, side: &str, role_id: i64) -> Result<i64> {
    let sql = format!(
        "SELECT COALESCE(MAX(cnt), 0) FROM (
            SELECT COUNT(*) AS cnt FROM bookings
            WHERE {side} = ?1 AND status = 'Completed'
            GROUP BY module_id
        )"
    );
    Ok(conn.query_row(&sql, [role_id], |r| r.get(0))?)
}

fn distinct_modules(conn: &Connection, side: &str, role_id: i64) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(DISTINCT module_id) FROM bookings WHERE {side} = ?1 AND status = 'Completed'"
    );
    Ok(conn.query_row(&sql, [role_id], |r| r.get(0))?)
}

fn sessions_with_notes(conn: &Connection, student_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE student_id = ?1 AND status = 'Completed'
           AND notes IS NOT NULL AND TRIM(notes) <> ''",
        [student_id],
        |r| r.get(0),
    )?)
}

fn five_star_reviews(conn: &Connection, tutor_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE tutor_id = ?1 AND rating = 5",
        [tutor_id],
        |r| r.get(0),
    )?)
}

fn average_rating(conn: &Connection, tutor_id: i64) -> Result<Option<f64>> {
    Ok(conn.query_row(
        "SELECT AVG(rating) FROM reviews WHERE tutor_id = ?1",
        [tutor_id],
        |r| r.get(0),
    )?)
}

fn distinct_students(conn: &Connection, tutor_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(DISTINCT student_id) FROM bookings WHERE tutor_id = ?1 AND status = 'Completed'",
        [tutor_id],
        |r| r.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::GamificationDb;

    fn mirror_db() -> GamificationDb {
        let db = GamificationDb::open_in_memory().unwrap();
        {
            let conn = db.conn();
            conn.execute_batch(
                r#"
                INSERT INTO users (user_id, role, role_id) VALUES ('stu', 'student', 1);
                INSERT INTO users (user_id, role, role_id) VALUES ('tut', 'tutor', 9);
                INSERT INTO users (user_id, role, role_id) VALUES ('odd', 'admin', 3);

                -- student 1 with tutor 9: two completed in module 100, one in 200, one pending
                INSERT INTO bookings (student_id, tutor_id, module_id, status, notes, end_time)
                    VALUES (1, 9, 100, 'Completed', 'Why does this converge?', 1000);
                INSERT INTO bookings (student_id, tutor_id, module_id, status, notes, end_time)
                    VALUES (1, 9, 100, 'Completed', NULL, 2000);
                INSERT INTO bookings (student_id, tutor_id, module_id, status, notes, end_time)
                    VALUES (1, 9, 200, 'Completed', '   ', 3000);
                INSERT INTO bookings (student_id, tutor_id, module_id, status, notes, end_time)
                    VALUES (1, 9, 200, 'Pending', NULL, NULL);
                -- a different student for the same tutor
                INSERT INTO bookings (student_id, tutor_id, module_id, status, notes, end_time)
                    VALUES (2, 9, 100, 'Completed', NULL, 4000);

                INSERT INTO reviews (tutor_id, rating, created_at) VALUES (9, 5, 1000);
                INSERT INTO reviews (tutor_id, rating, created_at) VALUES (9, 3, 2000);
                "#,
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn test_student_snapshot() {
        let db = mirror_db();
        let conn = db.conn();
        let snap = snapshot(&conn, "stu").unwrap();

        assert_eq!(snap.role, Some(UserRole::Student));
        assert_eq!(snap.completed_sessions, 3);
        assert_eq!(snap.top_module_sessions, 2);
        assert_eq!(snap.distinct_modules, 2);
        // Whitespace-only notes do not count as a question
        assert_eq!(snap.sessions_with_notes, 1);
        assert_eq!(snap.five_star_reviews, 0);
    }

    #[test]
    fn test_tutor_snapshot() {
        let db = mirror_db();
        let conn = db.conn();
        let snap = snapshot(&conn, "tut").unwrap();

        assert_eq!(snap.role, Some(UserRole::Tutor));
        assert_eq!(snap.completed_sessions, 4);
        assert_eq!(snap.distinct_students, 2);
        assert_eq!(snap.five_star_reviews, 1);
        assert!((snap.average_rating.unwrap() - 4.0).abs() < 1e-9);
        assert_eq!(snap.sessions_with_notes, 0);
    }

    #[test]
    fn test_missing_or_unknown_user_is_empty() {
        let db = mirror_db();
        let conn = db.conn();

        let missing = snapshot(&conn, "nobody").unwrap();
        assert_eq!(missing.role, None);
        assert_eq!(missing.completed_sessions, 0);

        // Unknown role string degrades the same way
        let odd = snapshot(&conn, "odd").unwrap();
        assert_eq!(odd.role, None);
    }
}
