//! Shared fixtures for gamification engine integration tests

#![allow(dead_code)]

use chrono::Utc;
use tempfile::TempDir;
use tutorquest::{
    ActivityRecorder, BookingRecord, GamificationDb, GamificationService, ReviewRecord,
    UserRecord, UserRole,
};

/// Route engine logs through the test harness when RUST_LOG is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Service over a throwaway on-disk database (WAL wants a real file).
pub fn test_service() -> (TempDir, GamificationService) {
    init_tracing();
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db = GamificationDb::open(&dir.path().join("gamification.db")).expect("Failed to open db");
    let service = GamificationService::new(db).expect("Failed to create service");
    (dir, service)
}

/// Mirror a student and return their user id.
pub fn student(recorder: &ActivityRecorder, role_id: i64) -> String {
    let user = UserRecord::with_generated_id(UserRole::Student, role_id);
    recorder.upsert_user(&user).expect("Failed to upsert student");
    user.user_id
}

/// Mirror a tutor and return their user id.
pub fn tutor(recorder: &ActivityRecorder, role_id: i64) -> String {
    let user = UserRecord::with_generated_id(UserRole::Tutor, role_id);
    recorder.upsert_user(&user).expect("Failed to upsert tutor");
    user.user_id
}

/// Mirror an already-completed booking.
pub fn completed_booking(recorder: &ActivityRecorder, student_id: i64, tutor_id: i64, module_id: i64) {
    recorder
        .record_booking(&BookingRecord {
            student_id,
            tutor_id,
            module_id,
            status: "Completed".to_string(),
            notes: None,
            end_time: Some(Utc::now().timestamp_millis()),
        })
        .expect("Failed to record booking");
}

/// Mirror a completed booking where the student asked a question.
pub fn completed_booking_with_notes(
    recorder: &ActivityRecorder,
    student_id: i64,
    tutor_id: i64,
    module_id: i64,
    notes: &str,
) {
    recorder
        .record_booking(&BookingRecord {
            student_id,
            tutor_id,
            module_id,
            status: "Completed".to_string(),
            notes: Some(notes.to_string()),
            end_time: Some(Utc::now().timestamp_millis()),
        })
        .expect("Failed to record booking");
}

/// Mirror a five-star review for a tutor.
pub fn five_star_review(recorder: &ActivityRecorder, tutor_id: i64) {
    recorder
        .record_review(&ReviewRecord {
            tutor_id,
            rating: 5,
            created_at: Utc::now().timestamp_millis(),
        })
        .expect("Failed to record review");
}
