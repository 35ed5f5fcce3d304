//! Persistence for completion records, user aggregates and unlocked achievements.
//!
//! Multi-step accounting runs inside a [`ProgressTx`]: nothing it writes is visible
//! until `commit`, and dropping it without committing discards every write.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    progress::{CompletionRecord, SubjectKind},
    user::UserProgress,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryProgressStore;
pub use postgres::PgProgressStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("transaction already finished")]
    Closed,
}

impl StoreError {
    pub fn user_not_found(id: &str) -> Self {
        StoreError::NotFound {
            entity: "User",
            id: id.to_string(),
        }
    }
}

pub type SharedStore = Arc<dyn ProgressStore>;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Opens a unit of work.
    async fn begin(&self) -> Result<Box<dyn ProgressTx>, StoreError>;

    async fn create_user(&self, user: &UserProgress) -> Result<UserProgress, StoreError>;

    async fn find_user(&self, user_id: &str) -> Result<Option<UserProgress>, StoreError>;

    /// Unlocked achievement ids with their unlock time, newest first.
    async fn user_achievements(
        &self,
        user_id: &str,
    ) -> Result<Vec<(String, DateTime<Utc>)>, StoreError>;

    /// Completed records of one user tagged with `course_id`, ordered by subject id.
    async fn course_completions(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Vec<CompletionRecord>, StoreError>;

    /// Users ordered by total XP (descending), ties broken by id.
    async fn top_users(&self, limit: i64) -> Result<Vec<UserProgress>, StoreError>;
}

#[async_trait]
pub trait ProgressTx: Send {
    /// Reads the user row and holds it for the rest of the transaction.
    async fn lock_user(&mut self, user_id: &str) -> Result<Option<UserProgress>, StoreError>;

    async fn find_completion(
        &mut self,
        user_id: &str,
        subject_id: &str,
    ) -> Result<Option<CompletionRecord>, StoreError>;

    /// Inserts or overwrites the record keyed by `(user_id, subject_id)`.
    async fn upsert_completion(
        &mut self,
        record: &CompletionRecord,
    ) -> Result<CompletionRecord, StoreError>;

    /// Adds `delta` to the stored total in place and stamps `last_activity`.
    /// Returns the new total.
    async fn increment_xp(
        &mut self,
        user_id: &str,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    async fn set_level(&mut self, user_id: &str, level: i64) -> Result<(), StoreError>;

    async fn set_streak(
        &mut self,
        user_id: &str,
        streak: i64,
        longest_streak: i64,
    ) -> Result<(), StoreError>;

    async fn count_completed(&mut self, user_id: &str, kind: SubjectKind)
    -> Result<i64, StoreError>;

    /// Records the unlock. Returns `false` if the user already had it.
    async fn unlock_achievement(
        &mut self,
        user_id: &str,
        achievement_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;
}
