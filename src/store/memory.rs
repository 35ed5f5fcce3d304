// src/store/memory.rs

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    models::{
        progress::{CompletionRecord, SubjectKind},
        user::UserProgress,
    },
    store::{ProgressStore, ProgressTx, StoreError},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<String, UserProgress>,
    completions: HashMap<(String, String), CompletionRecord>,
    achievements: HashMap<(String, String), DateTime<Utc>>,
}

/// Process-local store. A transaction holds the whole store lock, works on a staged
/// copy, and swaps it in on commit.
#[derive(Clone, Default)]
pub struct MemoryProgressStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn begin(&self) -> Result<Box<dyn ProgressTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();

        Ok(Box::new(MemoryProgressTx {
            guard: Some(guard),
            staged,
        }))
    }

    async fn create_user(&self, user: &UserProgress) -> Result<UserProgress, StoreError> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!(
                "User '{}' already exists",
                user.id
            )));
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(user.clone())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserProgress>, StoreError> {
        Ok(self.state.lock().await.users.get(user_id).cloned())
    }

    async fn user_achievements(
        &self,
        user_id: &str,
    ) -> Result<Vec<(String, DateTime<Utc>)>, StoreError> {
        let state = self.state.lock().await;
        let mut unlocked: Vec<(String, DateTime<Utc>)> = state
            .achievements
            .iter()
            .filter(|((uid, _), _)| uid == user_id)
            .map(|((_, achievement_id), at)| (achievement_id.clone(), *at))
            .collect();
        unlocked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(unlocked)
    }

    async fn course_completions(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Vec<CompletionRecord>, StoreError> {
        let state = self.state.lock().await;
        let mut records: Vec<CompletionRecord> = state
            .completions
            .values()
            .filter(|r| {
                r.user_id == user_id && r.completed && r.course_id.as_deref() == Some(course_id)
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));
        Ok(records)
    }

    async fn top_users(&self, limit: i64) -> Result<Vec<UserProgress>, StoreError> {
        let state = self.state.lock().await;
        let mut users: Vec<UserProgress> = state.users.values().cloned().collect();
        users.sort_by(|a, b| b.total_xp.cmp(&a.total_xp).then_with(|| a.id.cmp(&b.id)));
        users.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(users)
    }
}

pub struct MemoryProgressTx {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    staged: MemoryState,
}

impl MemoryProgressTx {
    fn staged(&mut self) -> Result<&mut MemoryState, StoreError> {
        if self.guard.is_none() {
            return Err(StoreError::Closed);
        }
        Ok(&mut self.staged)
    }

    fn user_mut(&mut self, user_id: &str) -> Result<&mut UserProgress, StoreError> {
        self.staged()?
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::user_not_found(user_id))
    }
}

#[async_trait]
impl ProgressTx for MemoryProgressTx {
    async fn lock_user(&mut self, user_id: &str) -> Result<Option<UserProgress>, StoreError> {
        Ok(self.staged()?.users.get(user_id).cloned())
    }

    async fn find_completion(
        &mut self,
        user_id: &str,
        subject_id: &str,
    ) -> Result<Option<CompletionRecord>, StoreError> {
        let key = (user_id.to_string(), subject_id.to_string());
        Ok(self.staged()?.completions.get(&key).cloned())
    }

    async fn upsert_completion(
        &mut self,
        record: &CompletionRecord,
    ) -> Result<CompletionRecord, StoreError> {
        let state = self.staged()?;
        if !state.users.contains_key(&record.user_id) {
            return Err(StoreError::user_not_found(&record.user_id));
        }

        let key = (record.user_id.clone(), record.subject_id.clone());
        let mut stored = record.clone();
        if stored.course_id.is_none() {
            stored.course_id = state.completions.get(&key).and_then(|r| r.course_id.clone());
        }
        state.completions.insert(key, stored.clone());
        Ok(stored)
    }

    async fn increment_xp(
        &mut self,
        user_id: &str,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let user = self.user_mut(user_id)?;
        user.total_xp += delta;
        user.last_activity = at;
        Ok(user.total_xp)
    }

    async fn set_level(&mut self, user_id: &str, level: i64) -> Result<(), StoreError> {
        self.user_mut(user_id)?.level = level;
        Ok(())
    }

    async fn set_streak(
        &mut self,
        user_id: &str,
        streak: i64,
        longest_streak: i64,
    ) -> Result<(), StoreError> {
        let user = self.user_mut(user_id)?;
        user.streak = streak;
        user.longest_streak = longest_streak;
        Ok(())
    }

    async fn count_completed(
        &mut self,
        user_id: &str,
        kind: SubjectKind,
    ) -> Result<i64, StoreError> {
        let count = self
            .staged()?
            .completions
            .values()
            .filter(|r| r.user_id == user_id && r.subject_kind == kind && r.completed)
            .count();
        Ok(count as i64)
    }

    async fn unlock_achievement(
        &mut self,
        user_id: &str,
        achievement_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let key = (user_id.to_string(), achievement_id.to_string());
        let achievements = &mut self.staged()?.achievements;
        if achievements.contains_key(&key) {
            return Ok(false);
        }
        achievements.insert(key, at);
        Ok(true)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let mut guard = self.guard.take().ok_or(StoreError::Closed)?;
        *guard = std::mem::take(&mut self.staged);
        Ok(())
    }
}
