// src/services/xp.rs

use chrono::{DateTime, Utc};

use crate::{
    config::XP_PER_LEVEL,
    models::user::{LevelProgress, UserProgress},
    store::{ProgressTx, StoreError},
};

/// `floor(total_xp / 100) + 1`. The stored level must always equal this.
pub fn level_for_xp(total_xp: i64) -> i64 {
    total_xp.max(0) / XP_PER_LEVEL + 1
}

pub fn level_progress(total_xp: i64) -> LevelProgress {
    let xp_into_level = total_xp.max(0) % XP_PER_LEVEL;
    LevelProgress {
        level: level_for_xp(total_xp),
        xp_into_level,
        xp_for_next_level: XP_PER_LEVEL - xp_into_level,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpUpdate {
    pub total_xp: i64,
    pub previous_level: i64,
    pub new_level: i64,
    pub leveled_up: bool,
}

/// Adds `xp_delta` to the user's total and re-derives the level.
///
/// `user` is the row as locked at the start of the transaction; its `level` is the
/// previous level. Only called for new completions.
pub async fn apply_xp(
    tx: &mut dyn ProgressTx,
    user: &UserProgress,
    xp_delta: i64,
    at: DateTime<Utc>,
) -> Result<XpUpdate, StoreError> {
    let total_xp = tx.increment_xp(&user.id, xp_delta, at).await?;
    let new_level = level_for_xp(total_xp);

    if new_level != user.level {
        tx.set_level(&user.id, new_level).await?;
    }

    let leveled_up = new_level > user.level;
    if leveled_up {
        tracing::info!(
            user_id = %user.id,
            from = user.level,
            to = new_level,
            "User leveled up"
        );
    }

    Ok(XpUpdate {
        total_xp,
        previous_level: user.level,
        new_level,
        leveled_up,
    })
}
