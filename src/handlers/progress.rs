// src/handlers/progress.rs

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::progress::{CompletionPayload, CourseProgress, CourseProgressParams},
    services::completion,
    store::{SharedStore, StoreError},
};

/// Marks a lesson, challenge or project as completed and awards XP.
///
/// * Returns 400 when `userId` or the subject id is missing, or the body is not valid JSON.
/// * Re-submitting a completed subject returns `alreadyCompleted` and awards nothing.
/// * Otherwise returns the record, XP delta, new total and level, and fresh achievements.
pub async fn complete<P: CompletionPayload>(
    State(store): State<SharedStore>,
    payload: Result<Json<P>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let event = payload.into_parts().into_event(P::KIND)?;

    let response = completion::complete_subject(store.as_ref(), &event, Utc::now())
        .await
        .map_err(|e| {
            if !matches!(e, StoreError::NotFound { .. }) {
                tracing::error!("Failed to complete {} '{}': {:?}", P::KIND, event.subject_id, e);
            }
            AppError::from(e)
        })?;

    Ok(Json(response))
}

/// Returns the completion sets and XP summary a course page renders from.
pub async fn get_course_progress(
    State(store): State<SharedStore>,
    Path(course_id): Path<String>,
    Query(params): Query<CourseProgressParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = params
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("userId is required".to_string()))?;

    let records = store
        .course_completions(&user_id, &course_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch course progress: {:?}", e);
            AppError::from(e)
        })?;
    let user = store.find_user(&user_id).await?;

    Ok(Json(CourseProgress::from_records(records, user.as_ref())))
}
