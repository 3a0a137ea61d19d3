//! Achievement criteria: typed unlock rules
//!
//! The catalog stores criteria as JSON blobs shaped like
//! `{"CriteriaType": "session_count", "RequiredCount": 10}` (field names are
//! matched case-insensitively, so `criteriaType` from older seeds still
//! works). Blobs are parsed into [`Criteria`] once at catalog load, so a
//! malformed rule fails at startup instead of silently never unlocking.
//!
//! A criteria type the parser recognizes but the evaluator has no data for
//! yet (study groups, board posts) simply never matches. A type string
//! nobody recognizes parses to [`Criteria::Unsupported`] and is logged at
//! load time.

use serde_json::Value;
use thiserror::Error;

use crate::activity::ActivitySnapshot;
use crate::models::{AchievementCategory, GamificationProfile, UserRole};

/// Profiles with at least this much XP are assumed to have verified their
/// email (the account store does not mirror the verification flag).
const EMAIL_VERIFIED_XP: i64 = 150;

/// Error type for criteria parsing
#[derive(Debug, Error)]
pub enum CriteriaError {
    #[error("criteria is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("criteria must be a JSON object")]
    NotAnObject,
    #[error("criteria is missing a CriteriaType field")]
    MissingType,
    #[error("CriteriaType must be a string")]
    TypeNotAString,
    #[error("criteria type {0:?} requires an integer RequiredCount")]
    MissingCount(String),
}

/// One achievement's unlock rule, parsed from its catalog JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    AccountCreated,
    EmailVerified,
    SessionCount { required: i64 },
    LoginStreak { required: i64 },
    ReachLevel { required: i64 },
    ModuleSessions { required: i64 },
    UniqueModules { required: i64 },
    FiveStarRating,
    FiveStarRatings { required: i64 },
    /// RequiredCount doubles as the 1-5 average to reach.
    HighRatingAverage { required: i64 },
    UniqueStudents { required: i64 },
    QuestionsAsked { required: i64 },
    JoinStudyGroup,
    BoardPosts,
    /// Well-formed rule with a type label nothing evaluates. Never matches.
    Unsupported(String),
}

impl Criteria {
    /// Parse a raw criteria JSON blob.
    pub fn parse(raw: &str) -> Result<Self, CriteriaError> {
        let value: Value = serde_json::from_str(raw)?;
        let obj = value.as_object().ok_or(CriteriaError::NotAnObject)?;

        let kind = field_ci(obj, "CriteriaType")
            .ok_or(CriteriaError::MissingType)?
            .as_str()
            .ok_or(CriteriaError::TypeNotAString)?;
        let count = field_ci(obj, "RequiredCount").and_then(Value::as_i64);

        Ok(match kind {
            "account_created" => Criteria::AccountCreated,
            "email_verified" => Criteria::EmailVerified,
            "session_count" => Criteria::SessionCount {
                required: required_count(kind, count)?,
            },
            "login_streak" => Criteria::LoginStreak {
                required: required_count(kind, count)?,
            },
            "reach_level" => Criteria::ReachLevel {
                required: required_count(kind, count)?,
            },
            "module_sessions" => Criteria::ModuleSessions {
                required: required_count(kind, count)?,
            },
            "unique_modules" => Criteria::UniqueModules {
                required: required_count(kind, count)?,
            },
            "five_star_rating" => Criteria::FiveStarRating,
            "five_star_ratings" => Criteria::FiveStarRatings {
                required: required_count(kind, count)?,
            },
            "high_rating_average" => Criteria::HighRatingAverage {
                required: required_count(kind, count)?,
            },
            "unique_students" => Criteria::UniqueStudents {
                required: required_count(kind, count)?,
            },
            "questions_asked" => Criteria::QuestionsAsked {
                required: required_count(kind, count)?,
            },
            "join_study_group" => Criteria::JoinStudyGroup,
            "board_posts" => Criteria::BoardPosts,
            other => Criteria::Unsupported(other.to_string()),
        })
    }

    /// True for rules that can never match (no evaluator or no data source).
    pub fn is_dormant(&self) -> bool {
        matches!(
            self,
            Criteria::JoinStudyGroup | Criteria::BoardPosts | Criteria::Unsupported(_)
        )
    }
}

/// Evaluate one achievement's rule for a user.
///
/// The category gates which rules are considered at all: a `session_count`
/// rule filed under Mastery never matches, and every Mastery rule requires
/// the tutor role. Anything unrecognized evaluates to false rather than
/// erroring, so one odd catalog row cannot break an award.
pub fn evaluate(
    category: AchievementCategory,
    criteria: &Criteria,
    profile: &GamificationProfile,
    snapshot: &ActivitySnapshot,
) -> bool {
    use AchievementCategory as Cat;

    let is_tutor = snapshot.role == Some(UserRole::Tutor);
    let is_student = snapshot.role == Some(UserRole::Student);

    match (category, criteria) {
        // Attendance: showing up at all
        (Cat::Attendance, Criteria::AccountCreated) => profile.xp > 0,
        (Cat::Attendance, Criteria::EmailVerified) => profile.xp >= EMAIL_VERIFIED_XP,
        (Cat::Attendance, Criteria::SessionCount { required }) => {
            snapshot.completed_sessions >= *required
        }
        (Cat::Attendance, Criteria::LoginStreak { required }) => {
            i64::from(profile.streak_count) >= *required
        }

        // Progress: how far the user has come
        (Cat::Progress, Criteria::ReachLevel { required }) => i64::from(profile.level) >= *required,
        (Cat::Progress, Criteria::ModuleSessions { required }) => {
            snapshot.top_module_sessions >= *required
        }
        (Cat::Progress, Criteria::UniqueModules { required }) => {
            snapshot.distinct_modules >= *required
        }

        // Mastery: tutor quality, tutors only
        (Cat::Mastery, Criteria::FiveStarRating) => is_tutor && snapshot.five_star_reviews >= 1,
        (Cat::Mastery, Criteria::FiveStarRatings { required }) => {
            is_tutor && snapshot.five_star_reviews >= *required
        }
        (Cat::Mastery, Criteria::HighRatingAverage { required }) => {
            is_tutor
                && snapshot
                    .average_rating
                    .is_some_and(|avg| avg >= *required as f64)
        }

        // Social: reach and engagement
        (Cat::Social, Criteria::UniqueStudents { required }) => {
            is_tutor && snapshot.distinct_students >= *required
        }
        (Cat::Social, Criteria::QuestionsAsked { required }) => {
            is_student && snapshot.sessions_with_notes >= *required
        }

        // Dormant rules and category/type mismatches stay locked
        _ => false,
    }
}

fn required_count(kind: &str, count: Option<i64>) -> Result<i64, CriteriaError> {
    count.ok_or_else(|| CriteriaError::MissingCount(kind.to_string()))
}

/// Case-insensitive object field lookup.
fn field_ci<'a>(obj: &'a serde_json::Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}
