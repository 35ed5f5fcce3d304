// src/models/achievement.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::progress::SubjectKind;

/// Condition under which an achievement unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementRule {
    /// At least `milestone` completed subjects of `kind`.
    Completed { kind: SubjectKind, milestone: i64 },
    /// A daily streak of at least `days`.
    Streak { days: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub rule: AchievementRule,
}

/// All achievements a learner can unlock.
pub const CATALOG: &[Achievement] = &[
    Achievement {
        id: "lesson-master",
        name: "Lesson Master",
        description: "Completed 10 lessons",
        rule: AchievementRule::Completed {
            kind: SubjectKind::Lesson,
            milestone: 10,
        },
    },
    Achievement {
        id: "streak-7",
        name: "7-Day Streak",
        description: "Learned 7 days in a row",
        rule: AchievementRule::Streak { days: 7 },
    },
    Achievement {
        id: "streak-14",
        name: "14-Day Streak",
        description: "Learned 14 days in a row",
        rule: AchievementRule::Streak { days: 14 },
    },
    Achievement {
        id: "streak-30",
        name: "30-Day Streak",
        description: "Learned 30 days in a row",
        rule: AchievementRule::Streak { days: 30 },
    },
    Achievement {
        id: "streak-60",
        name: "60-Day Streak",
        description: "Learned 60 days in a row",
        rule: AchievementRule::Streak { days: 60 },
    },
    Achievement {
        id: "streak-100",
        name: "100-Day Streak",
        description: "Learned 100 days in a row",
        rule: AchievementRule::Streak { days: 100 },
    },
    Achievement {
        id: "streak-365",
        name: "1-Year Streak",
        description: "Learned every day for a year",
        rule: AchievementRule::Streak { days: 365 },
    },
];

impl Achievement {
    pub fn find(id: &str) -> Option<&'static Achievement> {
        CATALOG.iter().find(|a| a.id == id)
    }

    pub fn unlocked(&self, unlocked_at: Option<DateTime<Utc>>) -> UnlockedAchievement {
        UnlockedAchievement {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            unlocked_at,
        }
    }
}

/// Wire form of an achievement the user holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedAchievement {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_ids_are_unique() {
        let ids: HashSet<_> = CATALOG.iter().map(|a| a.id).collect();
        assert_eq!(ids.len(), CATALOG.len());
    }

    #[test]
    fn test_find_lesson_master() {
        let achievement = Achievement::find("lesson-master").unwrap();
        assert_eq!(achievement.name, "Lesson Master");
        assert!(Achievement::find("unknown").is_none());
    }

    #[test]
    fn test_unlocked_omits_missing_timestamp() {
        let value = serde_json::to_value(CATALOG[0].unlocked(None)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "lesson-master",
                "name": "Lesson Master",
                "description": "Completed 10 lessons"
            })
        );
    }
}
