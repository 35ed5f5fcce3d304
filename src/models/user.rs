// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{models::achievement::UnlockedAchievement, utils::validation::validate_identifier};

/// Represents the 'users' table: a learner's aggregate progress.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub id: String,

    pub name: Option<String>,

    /// Never decreases.
    #[serde(rename = "totalXP")]
    pub total_xp: i64,

    /// Cached `floor(total_xp / 100) + 1`.
    pub level: i64,

    /// Consecutive days with at least one new completion.
    pub streak: i64,

    pub longest_streak: i64,

    pub last_activity: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl UserProgress {
    pub fn new(id: String, name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            total_xp: 0,
            level: 1,
            streak: 0,
            longest_streak: 0,
            last_activity: now,
            created_at: now,
        }
    }
}

/// DTO for creating a progress account.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 128), custom(function = validate_identifier))]
    pub id: String,

    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
}

/// Position of a user inside their current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub level: i64,
    pub xp_into_level: i64,
    pub xp_for_next_level: i64,
}

/// Response of `GET /api/users/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileResponse {
    #[serde(flatten)]
    pub user: UserProgress,
    pub level_progress: LevelProgress,
    pub achievements: Vec<UnlockedAchievement>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "totalXP")]
    pub total_xp: i64,
    pub level: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_starts_at_level_one() {
        let user = UserProgress::new("u1".into(), None, Utc::now());
        assert_eq!(user.total_xp, 0);
        assert_eq!(user.level, 1);
        assert_eq!(user.streak, 0);
    }

    #[test]
    fn test_create_user_validation() {
        let ok = CreateUserRequest {
            id: "e944cde4-af3a-4133-833c-fdbc3846af81".into(),
            name: Some("Demo".into()),
        };
        assert!(ok.validate().is_ok());

        let bad = CreateUserRequest {
            id: "has space".into(),
            name: None,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_user_serializes_total_xp_key() {
        let user = UserProgress::new("u1".into(), Some("Ada".into()), Utc::now());
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["totalXP"], 0);
        assert_eq!(value["longestStreak"], 0);
    }
}
