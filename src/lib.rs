//! Gamification engine for the TutorQuest tutoring marketplace
//!
//! Tracks experience points, level progression, daily streaks, and
//! achievement unlocks in a SQLite database (`~/.tutorquest/gamification.db`).
//! The same database mirrors the collaborator data criteria are evaluated
//! against (users, bookings, reviews); the host application writes those
//! through [`ActivityRecorder`] and the engine only ever reads them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │  Booking system  │     │  Review system   │
//! │  (mirror writes) │     │  (mirror writes) │
//! └────────┬─────────┘     └────────┬─────────┘
//!          │                        │
//!          └───────────┬────────────┘
//!                      ▼
//!          ~/.tutorquest/gamification.db
//!                      ▲
//!                      │
//!            GamificationService
//!        (awards, re-checks, reporting)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let service = GamificationService::open_default()?;
//!
//! // Mirror the user, then hand out points for a finished session
//! service.recorder().upsert_user(&user)?;
//! let outcome = service.award_points(&user.user_id, "SessionCompleted", 50, None)?;
//!
//! // Render the profile page
//! let profile = service.get_profile(&user.user_id);
//! ```

pub mod catalog;
pub mod criteria;
pub mod levels;
pub mod models;
pub mod streaks;

mod activity;
mod db;
mod engine;
mod profiles;
mod recorder;
mod reporting;

pub use activity::ActivitySnapshot;
pub use catalog::{CatalogAchievement, NewAchievement};
pub use criteria::{Criteria, CriteriaError};
pub use db::GamificationDb;
pub use engine::GamificationService;
pub use models::{
    AchievementCategory, AchievementView, ActivityEntry, AwardOutcome, BookingRecord,
    EarnedAchievement, GamificationProfile, LeaderboardEntry, ProfileView, ReviewRecord,
    UserRecord, UserRole, XpBreakdown,
};
pub use recorder::ActivityRecorder;
