//! Mirror write surface for collaborator data
//!
//! The booking, review, and account systems own this data; the engine only
//! reads it. Hosts push copies through here whenever their side changes
//! (tests use it to build fixtures).

use anyhow::Result;
use rusqlite::params;
use tracing::debug;

use crate::db::GamificationDb;
use crate::models::{BookingRecord, ReviewRecord, UserRecord};

/// Writer for the user/booking/review mirror tables
#[derive(Clone)]
pub struct ActivityRecorder {
    db: GamificationDb,
}

impl ActivityRecorder {
    pub fn new(db: GamificationDb) -> Self {
        Self { db }
    }

    /// Insert or replace a user's role mapping.
    pub fn upsert_user(&self, record: &UserRecord) -> Result<()> {
        let conn = self.db.conn();
        conn.execute(
            "INSERT OR REPLACE INTO users (user_id, role, role_id) VALUES (?1, ?2, ?3)",
            params![record.user_id, record.role.as_str(), record.role_id],
        )?;
        Ok(())
    }

    /// Mirror a booking. Returns the mirror row id so the host can complete
    /// it later.
    pub fn record_booking(&self, record: &BookingRecord) -> Result<i64> {
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO bookings (student_id, tutor_id, module_id, status, notes, end_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.student_id,
                record.tutor_id,
                record.module_id,
                record.status,
                record.notes,
                record.end_time,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Mirrored booking {} ({})", id, record.status);
        Ok(id)
    }

    /// Flip a mirrored booking to Completed.
    pub fn complete_booking(&self, booking_id: i64, end_time: i64) -> Result<()> {
        let conn = self.db.conn();
        conn.execute(
            "UPDATE bookings SET status = 'Completed', end_time = ?2 WHERE id = ?1",
            params![booking_id, end_time],
        )?;
        Ok(())
    }

    /// Mirror a tutor review.
    pub fn record_review(&self, record: &ReviewRecord) -> Result<i64> {
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO reviews (tutor_id, rating, created_at) VALUES (?1, ?2, ?3)",
            params![record.tutor_id, record.rating, record.created_at],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
