// src/handlers/leaderboard.rs

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    config::{LEADERBOARD_DEFAULT_LIMIT, LEADERBOARD_MAX_LIMIT},
    error::AppError,
    models::user::{LeaderboardEntry, LeaderboardParams},
    store::SharedStore,
};

/// Retrieves the top users by total XP, ranked from 1.
pub async fn get_leaderboard(
    State(store): State<SharedStore>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params
        .limit
        .unwrap_or(LEADERBOARD_DEFAULT_LIMIT)
        .clamp(1, LEADERBOARD_MAX_LIMIT);

    let users = store.top_users(limit).await.map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        AppError::from(e)
    })?;

    let leaderboard: Vec<LeaderboardEntry> = users
        .into_iter()
        .zip(1..)
        .map(|(user, rank)| LeaderboardEntry {
            rank,
            id: user.id,
            name: user.name,
            total_xp: user.total_xp,
            level: user.level,
        })
        .collect();

    Ok(Json(leaderboard))
}
