// src/services/ledger.rs

use chrono::{DateTime, Utc};

use crate::{
    models::progress::{CompletionEvent, CompletionRecord},
    store::{ProgressTx, StoreError},
};

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub already_completed: bool,
    pub xp_earned: i64,
    pub progress: CompletionRecord,
}

/// The idempotency gate: a subject already marked completed yields `xp_earned = 0`
/// and no write. Otherwise the record is upserted as completed at `now`.
pub async fn record_completion(
    tx: &mut dyn ProgressTx,
    event: &CompletionEvent,
    now: DateTime<Utc>,
) -> Result<LedgerEntry, StoreError> {
    if let Some(existing) = tx.find_completion(&event.user_id, &event.subject_id).await? {
        if existing.completed {
            return Ok(LedgerEntry {
                already_completed: true,
                xp_earned: 0,
                progress: existing,
            });
        }
    }

    let record = CompletionRecord {
        user_id: event.user_id.clone(),
        subject_id: event.subject_id.clone(),
        subject_kind: event.kind,
        course_id: event.course_id.clone(),
        completed: true,
        xp_earned: event.xp,
        completed_at: Some(now),
    };
    let progress = tx.upsert_completion(&record).await?;

    Ok(LedgerEntry {
        already_completed: false,
        xp_earned: event.xp,
        progress,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{progress::SubjectKind, user::UserProgress},
        store::{MemoryProgressStore, ProgressStore},
    };

    fn event(xp: i64) -> CompletionEvent {
        CompletionEvent {
            user_id: "u1".into(),
            subject_id: "git-101".into(),
            kind: SubjectKind::Lesson,
            xp,
            course_id: Some("git".into()),
        }
    }

    #[tokio::test]
    async fn test_second_completion_is_gated() {
        let store = MemoryProgressStore::new();
        store
            .create_user(&UserProgress::new("u1".into(), None, Utc::now()))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let first = record_completion(tx.as_mut(), &event(40), Utc::now()).await.unwrap();
        assert!(!first.already_completed);
        assert_eq!(first.xp_earned, 40);
        assert!(first.progress.completed);
        assert!(first.progress.completed_at.is_some());

        let second = record_completion(tx.as_mut(), &event(500), Utc::now()).await.unwrap();
        assert!(second.already_completed);
        assert_eq!(second.xp_earned, 0);
        assert_eq!(second.progress.xp_earned, 40);
    }

    #[tokio::test]
    async fn test_incomplete_record_is_upgraded() {
        let store = MemoryProgressStore::new();
        store
            .create_user(&UserProgress::new("u1".into(), None, Utc::now()))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.upsert_completion(&CompletionRecord {
            user_id: "u1".into(),
            subject_id: "git-101".into(),
            subject_kind: SubjectKind::Lesson,
            course_id: Some("git".into()),
            completed: false,
            xp_earned: 0,
            completed_at: None,
        })
        .await
        .unwrap();

        let entry = record_completion(tx.as_mut(), &event(50), Utc::now()).await.unwrap();
        assert!(!entry.already_completed);
        assert!(entry.progress.completed);
        assert_eq!(entry.progress.xp_earned, 50);
    }
}
