// src/services/streak.rs

use chrono::{DateTime, Utc};

use crate::{
    models::user::UserProgress,
    store::{ProgressTx, StoreError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub streak: i64,
    pub longest_streak: i64,
}

/// Advances a daily streak by UTC calendar day.
pub fn advance_streak(
    streak: i64,
    longest_streak: i64,
    last_activity: DateTime<Utc>,
    now: DateTime<Utc>,
) -> StreakUpdate {
    let days = (now.date_naive() - last_activity.date_naive()).num_days();

    let streak = match days {
        1 => streak + 1,
        // Same day, or a clock that went backwards.
        d if d <= 0 => streak.max(1),
        _ => 1,
    };

    StreakUpdate {
        streak,
        longest_streak: longest_streak.max(streak),
    }
}

/// Applies today's activity to the locked user row.
pub async fn touch_streak(
    tx: &mut dyn ProgressTx,
    user: &UserProgress,
    now: DateTime<Utc>,
) -> Result<StreakUpdate, StoreError> {
    let update = advance_streak(user.streak, user.longest_streak, user.last_activity, now);

    if update.streak != user.streak || update.longest_streak != user.longest_streak {
        tx.set_streak(&user.id, update.streak, update.longest_streak)
            .await?;
    }

    Ok(update)
}
