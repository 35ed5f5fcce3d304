// src/services/achievements.rs

use chrono::{DateTime, Utc};

use crate::{
    models::{
        achievement::{Achievement, AchievementRule, CATALOG, UnlockedAchievement},
        progress::SubjectKind,
    },
    store::{ProgressTx, StoreError},
};

/// Aggregate counts an unlock rule is checked against.
#[derive(Debug, Clone, Copy)]
pub struct AchievementStats {
    pub kind: SubjectKind,
    pub completed: i64,
    pub streak: i64,
}

fn rule_holds(rule: AchievementRule, stats: &AchievementStats) -> bool {
    match rule {
        AchievementRule::Completed { kind, milestone } => {
            kind == stats.kind && stats.completed >= milestone
        }
        AchievementRule::Streak { days } => stats.streak >= days,
    }
}

/// Catalog entries whose threshold is met by `stats`.
pub fn qualifying(stats: &AchievementStats) -> impl Iterator<Item = &'static Achievement> + '_ {
    CATALOG.iter().filter(move |a| rule_holds(a.rule, stats))
}

/// Checks the catalog after a new completion of `kind` and records fresh unlocks.
///
/// Returns only achievements unlocked by this call; ones the user already holds
/// are skipped even if their rule still holds.
pub async fn evaluate_achievements(
    tx: &mut dyn ProgressTx,
    user_id: &str,
    kind: SubjectKind,
    streak: i64,
    at: DateTime<Utc>,
) -> Result<Vec<UnlockedAchievement>, StoreError> {
    let completed = tx.count_completed(user_id, kind).await?;
    let stats = AchievementStats {
        kind,
        completed,
        streak,
    };

    let mut unlocked = Vec::new();
    for achievement in qualifying(&stats) {
        if tx.unlock_achievement(user_id, achievement.id, at).await? {
            tracing::info!(user_id, achievement = achievement.id, "Achievement unlocked");
            unlocked.push(achievement.unlocked(None));
        }
    }

    Ok(unlocked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(stats: AchievementStats) -> Vec<&'static str> {
        qualifying(&stats).map(|a| a.id).collect()
    }

    #[test]
    fn test_lesson_master_threshold() {
        let nine = AchievementStats { kind: SubjectKind::Lesson, completed: 9, streak: 1 };
        assert!(ids(nine).is_empty());

        let ten = AchievementStats { kind: SubjectKind::Lesson, completed: 10, streak: 1 };
        assert_eq!(ids(ten), vec!["lesson-master"]);

        let twelve = AchievementStats { kind: SubjectKind::Lesson, completed: 12, streak: 1 };
        assert_eq!(ids(twelve), vec!["lesson-master"]);
    }

    #[test]
    fn test_lesson_rule_ignores_other_kinds() {
        let stats = AchievementStats { kind: SubjectKind::Challenge, completed: 50, streak: 0 };
        assert!(ids(stats).is_empty());
    }

    #[test]
    fn test_streak_milestones_accumulate() {
        let stats = AchievementStats { kind: SubjectKind::Project, completed: 1, streak: 30 };
        assert_eq!(ids(stats), vec!["streak-7", "streak-14", "streak-30"]);
    }
}
