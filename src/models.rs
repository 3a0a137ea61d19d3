//! Data models for the gamification engine
//!
//! Record structs mirror what the host platform stores (users, bookings,
//! reviews); view structs are what the reporting surface hands back to the
//! profile page. Timestamps are Unix epoch milliseconds throughout.

use serde::{Deserialize, Serialize};

use crate::levels;

/// Role a platform user holds. Criteria evaluation is role-sensitive:
/// mastery achievements only apply to tutors, question-asking only to
/// students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Tutor,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Tutor => "tutor",
        }
    }

    /// Parse a stored role string (case-insensitive). Unknown roles map to
    /// None so a bad row degrades to "no activity" instead of an error.
    pub fn from_str(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("student") {
            Some(UserRole::Student)
        } else if s.eq_ignore_ascii_case("tutor") {
            Some(UserRole::Tutor)
        } else {
            None
        }
    }
}

/// Category an achievement belongs to. The category gates which criteria
/// types are even considered during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AchievementCategory {
    Attendance,
    Progress,
    Mastery,
    Social,
}

impl AchievementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementCategory::Attendance => "Attendance",
            AchievementCategory::Progress => "Progress",
            AchievementCategory::Mastery => "Mastery",
            AchievementCategory::Social => "Social",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Attendance" => Some(AchievementCategory::Attendance),
            "Progress" => Some(AchievementCategory::Progress),
            "Mastery" => Some(AchievementCategory::Mastery),
            "Social" => Some(AchievementCategory::Social),
            _ => None,
        }
    }
}

/// One user's gamification state. `level` and `rank` are cached derivations
/// of `xp` and are recomputed on every write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamificationProfile {
    pub user_id: String,
    pub xp: i64,
    pub level: u32,
    pub rank: String,
    /// Consecutive calendar days (UTC) with at least one award.
    pub streak_count: u32,
    /// Unix ms of the most recent award; only its date part matters.
    pub last_activity_at: i64,
}

impl GamificationProfile {
    /// A brand-new profile: zero XP, level 1, streak not yet started.
    pub fn fresh(user_id: &str, now_ms: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            xp: 0,
            level: 1,
            rank: levels::rank_for_level(1).to_string(),
            streak_count: 0,
            last_activity_at: now_ms,
        }
    }
}

/// One earned (or partially earned) achievement row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarnedAchievement {
    pub achievement_id: i64,
    pub earned_at: i64,
    /// 0-100; the engine only ever writes 100.
    pub progress: u8,
}

/// Platform user as mirrored from the host's account system.
///
/// `user_id` is the host's string identity key; `role_id` is the numeric id
/// bookings and reviews reference (student_id / tutor_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub role: UserRole,
    pub role_id: i64,
}

impl UserRecord {
    /// Convenience for hosts (and tests) that have not minted an id yet.
    pub fn with_generated_id(role: UserRole, role_id: i64) -> Self {
        Self {
            user_id: uuid::Uuid::new_v4().to_string(),
            role,
            role_id,
        }
    }
}

/// Tutoring session as mirrored from the booking system. Only rows with
/// status `Completed` count toward criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRecord {
    pub student_id: i64,
    pub tutor_id: i64,
    pub module_id: i64,
    pub status: String,
    /// Student notes; non-empty notes count as a question asked.
    pub notes: Option<String>,
    /// Unix ms when the session ended (None while pending).
    pub end_time: Option<i64>,
}

/// Tutor review as mirrored from the review system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub tutor_id: i64,
    /// 1-5 stars.
    pub rating: u8,
    pub created_at: i64,
}

/// Result of a single `award_points` call.
#[derive(Debug, Clone, Serialize)]
pub struct AwardOutcome {
    pub success: bool,
    pub points_awarded: i64,
    /// Set when this award pushed the user over a level threshold.
    pub new_level: Option<u32>,
    /// Names of achievements unlocked during the re-check, in unlock order.
    pub unlocked_achievements: Vec<String>,
    pub message: String,
}

/// Everything the profile page needs for one user.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub user_id: String,
    pub xp: i64,
    pub level: u32,
    pub rank: String,
    pub streak: u32,
    pub points_to_next_level: i64,
    /// 0.0-1.0 through the current level band.
    pub level_progress: f64,
    pub achievements: Vec<AchievementView>,
}

impl ProfileView {
    /// What a caller sees when the store cannot be read: the same shape as a
    /// brand-new profile, so the page still renders.
    pub fn fallback(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            xp: 0,
            level: 1,
            rank: levels::rank_for_level(1).to_string(),
            streak: 0,
            points_to_next_level: levels::points_to_next_level(0),
            level_progress: 0.0,
            achievements: Vec::new(),
        }
    }
}

/// One achievement as shown on the profile page or badge wall.
#[derive(Debug, Clone, Serialize)]
pub struct AchievementView {
    pub name: String,
    pub description: String,
    pub icon_url: String,
    /// None if not yet earned (badge wall shows locked badges too).
    pub earned_at: Option<i64>,
    pub progress: u8,
    pub is_completed: bool,
}

/// Estimated split of a user's total XP by source. Derived from current
/// activity counts, not from an award ledger, so the buckets are
/// approximations that always sum to at most `total`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct XpBreakdown {
    pub sessions: i64,
    pub achievements: i64,
    pub daily_login: i64,
    pub bonuses: i64,
    /// Whatever the other buckets cannot explain; floored at zero.
    pub other: i64,
    pub total: i64,
}

/// One row of the recent-activity feed.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    /// "SessionCompleted", "AchievementEarned", "DailyLogin" or "FiveStarReview".
    pub kind: String,
    pub description: String,
    pub points: i64,
    pub timestamp: i64,
    /// Icon hint for the feed UI.
    pub icon: String,
    /// Badge color hint for the feed UI.
    pub color: String,
}

/// One row of the XP leaderboard.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub xp: i64,
    pub level: u32,
    pub rank: String,
    pub streak: u32,
}
