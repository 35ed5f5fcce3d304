// src/services/completion.rs

use chrono::{DateTime, Utc};

use crate::{
    models::progress::{
        AlreadyCompletedResponse, CompletionEvent, CompletionReceipt, CompletionResponse,
    },
    services::{achievements, ledger, streak, xp},
    store::{ProgressStore, StoreError},
};

/// Applies one completion event for any subject kind.
///
/// Ledger update, streak, XP grant and achievement unlocks share one transaction
/// that starts by locking the user row, so a failure at any step leaves nothing
/// behind and concurrent completions for the same user are serialized.
pub async fn complete_subject(
    store: &dyn ProgressStore,
    event: &CompletionEvent,
    now: DateTime<Utc>,
) -> Result<CompletionResponse, StoreError> {
    let mut tx = store.begin().await?;

    let user = tx
        .lock_user(&event.user_id)
        .await?
        .ok_or_else(|| StoreError::user_not_found(&event.user_id))?;

    let entry = ledger::record_completion(tx.as_mut(), event, now).await?;
    if entry.already_completed {
        tracing::debug!(
            user_id = %event.user_id,
            subject_id = %event.subject_id,
            kind = %event.kind,
            "Subject already completed, no XP awarded"
        );
        return Ok(CompletionResponse::AlreadyCompleted(
            AlreadyCompletedResponse::for_kind(event.kind),
        ));
    }

    let streak = streak::touch_streak(tx.as_mut(), &user, now).await?;
    let xp = xp::apply_xp(tx.as_mut(), &user, entry.xp_earned, now).await?;
    let achievements =
        achievements::evaluate_achievements(tx.as_mut(), &event.user_id, event.kind, streak.streak, now)
            .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %event.user_id,
        subject_id = %event.subject_id,
        kind = %event.kind,
        xp = entry.xp_earned,
        total_xp = xp.total_xp,
        "Subject completed"
    );

    Ok(CompletionResponse::Completed(CompletionReceipt {
        progress: entry.progress,
        xp_earned: entry.xp_earned,
        total_xp: xp.total_xp,
        new_level: xp.new_level,
        leveled_up: xp.leveled_up,
        achievements,
    }))
}
