// src/handlers/users.rs

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        achievement::Achievement,
        user::{CreateUserRequest, UserProfileResponse, UserProgress},
    },
    services::xp::level_progress,
    store::SharedStore,
};

/// Creates a progress account starting at 0 XP, level 1.
/// Returns 201 Created, or 409 if the id is taken.
pub async fn create_user(
    State(store): State<SharedStore>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let user = store
        .create_user(&UserProgress::new(payload.id, payload.name, Utc::now()))
        .await?;

    tracing::info!(user_id = %user.id, "Progress account created");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Returns the user's XP state, position within the level and unlocked achievements.
pub async fn get_user(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = store
        .find_user(&id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let achievements = store
        .user_achievements(&id)
        .await?
        .into_iter()
        .filter_map(|(achievement_id, unlocked_at)| {
            Achievement::find(&achievement_id).map(|a| a.unlocked(Some(unlocked_at)))
        })
        .collect();

    Ok(Json(UserProfileResponse {
        level_progress: level_progress(user.total_xp),
        user,
        achievements,
    }))
}
