//! Achievement catalog: the stock set, seeding, and validated loading
//!
//! The catalog lives in the `achievements` table and is treated as immutable
//! at runtime. Criteria blobs are parsed while loading, so a malformed row
//! surfaces as a startup error rather than an achievement that quietly never
//! unlocks.

use anyhow::{Context, Result};
use rusqlite::params;
use tracing::{debug, warn};

use crate::criteria::Criteria;
use crate::db::GamificationDb;
use crate::models::AchievementCategory;

/// Name of the onboarding achievement granted when a profile is created.
pub const GETTING_STARTED: &str = "Getting Started";

/// One catalog row with its criteria already parsed.
#[derive(Debug, Clone)]
pub struct CatalogAchievement {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon_url: String,
    pub category: AchievementCategory,
    pub reward_points: i64,
    pub criteria: Criteria,
}

/// Input for inserting a catalog row; the criteria blob is validated before
/// it is written.
#[derive(Debug, Clone)]
pub struct NewAchievement {
    pub name: String,
    pub description: String,
    pub icon_url: String,
    pub category: AchievementCategory,
    pub reward_points: i64,
    pub criteria: String,
}

/// Load and validate the whole catalog, ordered by id.
pub fn load(db: &GamificationDb) -> Result<Vec<CatalogAchievement>> {
    let conn = db.conn();
    let mut stmt = conn.prepare(
        "SELECT id, name, description, icon_url, category, reward_points, criteria
         FROM achievements ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i64>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut catalog = Vec::new();
    for row in rows {
        let (id, name, description, icon_url, category, reward_points, raw) = row?;

        let category = AchievementCategory::from_str(&category)
            .with_context(|| format!("Achievement {name:?} has unknown category {category:?}"))?;
        let criteria = Criteria::parse(&raw)
            .with_context(|| format!("Achievement {name:?} has malformed criteria"))?;

        if let Criteria::Unsupported(label) = &criteria {
            warn!(
                "Achievement {:?} uses unknown criteria type {:?}; it can never unlock",
                name, label
            );
        }

        catalog.push(CatalogAchievement {
            id,
            name,
            description,
            icon_url,
            category,
            reward_points,
            criteria,
        });
    }

    debug!("Loaded {} catalog achievements", catalog.len());
    Ok(catalog)
}

/// Insert the stock achievement set if the catalog is empty. Safe to call on
/// every startup; returns the number of rows inserted.
pub fn seed_defaults(db: &GamificationDb) -> Result<usize> {
    let conn = db.conn();
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM achievements", [], |r| r.get(0))?;
    if existing > 0 {
        return Ok(0);
    }

    for seed in STOCK_ACHIEVEMENTS {
        conn.execute(
            "INSERT OR IGNORE INTO achievements (name, description, icon_url, category, reward_points, criteria)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                seed.name,
                seed.description,
                seed.icon_url,
                seed.category.as_str(),
                seed.reward_points,
                seed.criteria,
            ],
        )?;
    }

    debug!("Seeded {} stock achievements", STOCK_ACHIEVEMENTS.len());
    Ok(STOCK_ACHIEVEMENTS.len())
}

/// Validate and insert a single achievement. Unknown criteria *types* are
/// allowed (they parse to a dormant rule); malformed blobs are rejected.
pub fn insert(db: &GamificationDb, achievement: &NewAchievement) -> Result<i64> {
    let parsed = Criteria::parse(&achievement.criteria)
        .with_context(|| format!("Achievement {:?} criteria rejected", achievement.name))?;
    if let Criteria::Unsupported(label) = &parsed {
        warn!(
            "Inserting achievement {:?} with unknown criteria type {:?}; it can never unlock",
            achievement.name, label
        );
    }

    let conn = db.conn();
    conn.execute(
        "INSERT INTO achievements (name, description, icon_url, category, reward_points, criteria)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            achievement.name,
            achievement.description,
            achievement.icon_url,
            achievement.category.as_str(),
            achievement.reward_points,
            achievement.criteria,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Stock achievement seed
struct SeedAchievement {
    name: &'static str,
    description: &'static str,
    icon_url: &'static str,
    category: AchievementCategory,
    reward_points: i64,
    criteria: &'static str,
}

/// The stock catalog, as seeded into a fresh install.
static STOCK_ACHIEVEMENTS: &[SeedAchievement] = &[
    // ---- Attendance ----
    SeedAchievement {
        name: "Getting Started",
        description: "Create your account and begin your learning journey",
        icon_url: "/images/achievements/getting-started.png",
        category: AchievementCategory::Attendance,
        reward_points: 50,
        criteria: r#"{"CriteriaType":"account_created"}"#,
    },
    SeedAchievement {
        name: "Verified Scholar",
        description: "Verify your email address",
        icon_url: "/images/achievements/verified-scholar.png",
        category: AchievementCategory::Attendance,
        reward_points: 25,
        criteria: r#"{"CriteriaType":"email_verified"}"#,
    },
    SeedAchievement {
        name: "First Session",
        description: "Complete your first tutoring session",
        icon_url: "/images/achievements/first-session.png",
        category: AchievementCategory::Attendance,
        reward_points: 50,
        criteria: r#"{"CriteriaType":"session_count","RequiredCount":1}"#,
    },
    SeedAchievement {
        name: "Regular",
        description: "Complete 10 tutoring sessions",
        icon_url: "/images/achievements/regular.png",
        category: AchievementCategory::Attendance,
        reward_points: 100,
        criteria: r#"{"CriteriaType":"session_count","RequiredCount":10}"#,
    },
    SeedAchievement {
        name: "Dedicated Learner",
        description: "Complete 25 tutoring sessions",
        icon_url: "/images/achievements/dedicated-learner.png",
        category: AchievementCategory::Attendance,
        reward_points: 200,
        criteria: r#"{"CriteriaType":"session_count","RequiredCount":25}"#,
    },
    SeedAchievement {
        name: "Week Streak",
        description: "Stay active 7 days in a row",
        icon_url: "/images/achievements/week-streak.png",
        category: AchievementCategory::Attendance,
        reward_points: 75,
        criteria: r#"{"CriteriaType":"login_streak","RequiredCount":7}"#,
    },
    SeedAchievement {
        name: "Unstoppable",
        description: "Stay active 30 days in a row",
        icon_url: "/images/achievements/unstoppable.png",
        category: AchievementCategory::Attendance,
        reward_points: 300,
        criteria: r#"{"CriteriaType":"login_streak","RequiredCount":30}"#,
    },
    // ---- Progress ----
    SeedAchievement {
        name: "Rising Star",
        description: "Reach level 5",
        icon_url: "/images/achievements/rising-star.png",
        category: AchievementCategory::Progress,
        reward_points: 100,
        criteria: r#"{"CriteriaType":"reach_level","RequiredCount":5}"#,
    },
    SeedAchievement {
        name: "Halfway There",
        description: "Reach level 10",
        icon_url: "/images/achievements/halfway-there.png",
        category: AchievementCategory::Progress,
        reward_points: 250,
        criteria: r#"{"CriteriaType":"reach_level","RequiredCount":10}"#,
    },
    SeedAchievement {
        name: "Module Master",
        description: "Complete 10 sessions in a single module",
        icon_url: "/images/achievements/module-master.png",
        category: AchievementCategory::Progress,
        reward_points: 150,
        criteria: r#"{"CriteriaType":"module_sessions","RequiredCount":10}"#,
    },
    SeedAchievement {
        name: "Explorer",
        description: "Take sessions in 3 different modules",
        icon_url: "/images/achievements/explorer.png",
        category: AchievementCategory::Progress,
        reward_points: 75,
        criteria: r#"{"CriteriaType":"unique_modules","RequiredCount":3}"#,
    },
    SeedAchievement {
        name: "Renaissance Scholar",
        description: "Take sessions in 5 different modules",
        icon_url: "/images/achievements/renaissance-scholar.png",
        category: AchievementCategory::Progress,
        reward_points: 150,
        criteria: r#"{"CriteriaType":"unique_modules","RequiredCount":5}"#,
    },
    // ---- Mastery (tutors only) ----
    SeedAchievement {
        name: "First Five Stars",
        description: "Receive your first 5-star review",
        icon_url: "/images/achievements/first-five-stars.png",
        category: AchievementCategory::Mastery,
        reward_points: 50,
        criteria: r#"{"CriteriaType":"five_star_rating"}"#,
    },
    SeedAchievement {
        name: "Top Rated Tutor",
        description: "Receive 5 five-star reviews",
        icon_url: "/images/achievements/top-rated-tutor.png",
        category: AchievementCategory::Mastery,
        reward_points: 250,
        criteria: r#"{"CriteriaType":"five_star_ratings","RequiredCount":5}"#,
    },
    SeedAchievement {
        name: "Highly Rated",
        description: "Maintain an average rating of 4 stars or better",
        icon_url: "/images/achievements/highly-rated.png",
        category: AchievementCategory::Mastery,
        reward_points: 150,
        criteria: r#"{"CriteriaType":"high_rating_average","RequiredCount":4}"#,
    },
    // ---- Social ----
    SeedAchievement {
        name: "People Person",
        description: "Teach 5 different students",
        icon_url: "/images/achievements/people-person.png",
        category: AchievementCategory::Social,
        reward_points: 100,
        criteria: r#"{"CriteriaType":"unique_students","RequiredCount":5}"#,
    },
    SeedAchievement {
        name: "Community Favorite",
        description: "Teach 15 different students",
        icon_url: "/images/achievements/community-favorite.png",
        category: AchievementCategory::Social,
        reward_points: 250,
        criteria: r#"{"CriteriaType":"unique_students","RequiredCount":15}"#,
    },
    SeedAchievement {
        name: "Curious Mind",
        description: "Ask questions in 5 of your sessions",
        icon_url: "/images/achievements/curious-mind.png",
        category: AchievementCategory::Social,
        reward_points: 75,
        criteria: r#"{"CriteriaType":"questions_asked","RequiredCount":5}"#,
    },
    // Waiting on study-group and discussion-board mirrors
    SeedAchievement {
        name: "Study Buddy",
        description: "Join a study group",
        icon_url: "/images/achievements/study-buddy.png",
        category: AchievementCategory::Social,
        reward_points: 50,
        criteria: r#"{"CriteriaType":"join_study_group"}"#,
    },
    SeedAchievement {
        name: "Discussion Starter",
        description: "Post 5 times on the discussion board",
        icon_url: "/images/achievements/discussion-starter.png",
        category: AchievementCategory::Social,
        reward_points: 50,
        criteria: r#"{"CriteriaType":"board_posts"}"#,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_once() {
        let db = GamificationDb::open_in_memory().unwrap();
        let first = seed_defaults(&db).unwrap();
        assert_eq!(first, STOCK_ACHIEVEMENTS.len());

        // Second seed is a no-op
        let second = seed_defaults(&db).unwrap();
        assert_eq!(second, 0);

        let conn = db.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM achievements", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count as usize, STOCK_ACHIEVEMENTS.len());
    }

    #[test]
    fn test_stock_catalog_loads_clean() {
        let db = GamificationDb::open_in_memory().unwrap();
        seed_defaults(&db).unwrap();
        let catalog = load(&db).unwrap();

        assert_eq!(catalog.len(), STOCK_ACHIEVEMENTS.len());
        // No stock rule should be Unsupported; dormant rules are named variants
        assert!(
            catalog
                .iter()
                .all(|a| !matches!(a.criteria, Criteria::Unsupported(_)))
        );
        assert!(catalog.iter().any(|a| a.name == GETTING_STARTED));
        assert!(catalog.iter().any(|a| a.name == "Top Rated Tutor"));
    }

    #[test]
    fn test_insert_rejects_malformed_criteria() {
        let db = GamificationDb::open_in_memory().unwrap();
        let result = insert(
            &db,
            &NewAchievement {
                name: "Broken".to_string(),
                description: String::new(),
                icon_url: String::new(),
                category: AchievementCategory::Attendance,
                reward_points: 10,
                criteria: r#"{"RequiredCount":3}"#.to_string(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_insert_allows_unknown_type() {
        let db = GamificationDb::open_in_memory().unwrap();
        let id = insert(
            &db,
            &NewAchievement {
                name: "Mystery".to_string(),
                description: String::new(),
                icon_url: String::new(),
                category: AchievementCategory::Social,
                reward_points: 10,
                criteria: r#"{"CriteriaType":"tea_ceremonies","RequiredCount":3}"#.to_string(),
            },
        )
        .unwrap();
        assert!(id > 0);

        let catalog = load(&db).unwrap();
        assert_eq!(
            catalog[0].criteria,
            Criteria::Unsupported("tea_ceremonies".to_string())
        );
    }

    #[test]
    fn test_load_fails_on_malformed_row() {
        let db = GamificationDb::open_in_memory().unwrap();
        {
            let conn = db.conn();
            conn.execute(
                "INSERT INTO achievements (name, category, criteria) VALUES ('Bad', 'Attendance', 'not json')",
                [],
            )
            .unwrap();
        }
        assert!(load(&db).is_err());
    }
}
