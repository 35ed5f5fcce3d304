// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::{
    models::{
        progress::{CompletionRecord, SubjectKind},
        user::UserProgress,
    },
    store::{ProgressStore, ProgressTx, StoreError},
};

/// Helper struct for reading `completion_records`; the kind is stored as text.
#[derive(sqlx::FromRow)]
struct CompletionRow {
    user_id: String,
    subject_id: String,
    subject_kind: String,
    course_id: Option<String>,
    completed: bool,
    xp_earned: i64,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<CompletionRow> for CompletionRecord {
    type Error = StoreError;

    fn try_from(row: CompletionRow) -> Result<Self, Self::Error> {
        Ok(CompletionRecord {
            subject_kind: row.subject_kind.parse().map_err(StoreError::Corrupt)?,
            user_id: row.user_id,
            subject_id: row.subject_id,
            course_id: row.course_id,
            completed: row.completed,
            xp_earned: row.xp_earned,
            completed_at: row.completed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AchievementRow {
    achievement_id: String,
    unlocked_at: DateTime<Utc>,
}

/// Postgres-backed store. Completion transactions lock the user row with `FOR UPDATE`.
#[derive(Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn begin(&self) -> Result<Box<dyn ProgressTx>, StoreError> {
        let tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to begin transaction: {:?}", e);
            StoreError::Database(e)
        })?;

        Ok(Box::new(PgProgressTx { tx: Some(tx) }))
    }

    async fn create_user(&self, user: &UserProgress) -> Result<UserProgress, StoreError> {
        sqlx::query_as::<_, UserProgress>(
            r#"
            INSERT INTO users (id, name, total_xp, level, streak, longest_streak, last_activity, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, total_xp, level, streak, longest_streak, last_activity, created_at
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(user.total_xp)
        .bind(user.level)
        .bind(user.streak)
        .bind(user.longest_streak)
        .bind(user.last_activity)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                StoreError::Conflict(format!("User '{}' already exists", user.id))
            } else {
                StoreError::Database(e)
            }
        })
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserProgress>, StoreError> {
        let user = sqlx::query_as::<_, UserProgress>(
            r#"
            SELECT id, name, total_xp, level, streak, longest_streak, last_activity, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn user_achievements(
        &self,
        user_id: &str,
    ) -> Result<Vec<(String, DateTime<Utc>)>, StoreError> {
        let rows = sqlx::query_as::<_, AchievementRow>(
            r#"
            SELECT achievement_id, unlocked_at
            FROM user_achievements
            WHERE user_id = $1
            ORDER BY unlocked_at DESC, achievement_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.achievement_id, r.unlocked_at))
            .collect())
    }

    async fn course_completions(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Vec<CompletionRecord>, StoreError> {
        let rows = sqlx::query_as::<_, CompletionRow>(
            r#"
            SELECT user_id, subject_id, subject_kind, course_id, completed, xp_earned, completed_at
            FROM completion_records
            WHERE user_id = $1 AND course_id = $2 AND completed
            ORDER BY subject_id
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CompletionRecord::try_from).collect()
    }

    async fn top_users(&self, limit: i64) -> Result<Vec<UserProgress>, StoreError> {
        let users = sqlx::query_as::<_, UserProgress>(
            r#"
            SELECT id, name, total_xp, level, streak, longest_streak, last_activity, created_at
            FROM users
            ORDER BY total_xp DESC, id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

/// Wraps a live transaction. Rolled back on drop unless committed.
pub struct PgProgressTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgProgressTx {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.tx.as_deref_mut().ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl ProgressTx for PgProgressTx {
    async fn lock_user(&mut self, user_id: &str) -> Result<Option<UserProgress>, StoreError> {
        let user = sqlx::query_as::<_, UserProgress>(
            r#"
            SELECT id, name, total_xp, level, streak, longest_streak, last_activity, created_at
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(user)
    }

    async fn find_completion(
        &mut self,
        user_id: &str,
        subject_id: &str,
    ) -> Result<Option<CompletionRecord>, StoreError> {
        let row = sqlx::query_as::<_, CompletionRow>(
            r#"
            SELECT user_id, subject_id, subject_kind, course_id, completed, xp_earned, completed_at
            FROM completion_records
            WHERE user_id = $1 AND subject_id = $2
            "#,
        )
        .bind(user_id)
        .bind(subject_id)
        .fetch_optional(self.conn()?)
        .await?;

        row.map(CompletionRecord::try_from).transpose()
    }

    async fn upsert_completion(
        &mut self,
        record: &CompletionRecord,
    ) -> Result<CompletionRecord, StoreError> {
        let row = sqlx::query_as::<_, CompletionRow>(
            r#"
            INSERT INTO completion_records
                (user_id, subject_id, subject_kind, course_id, completed, xp_earned, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, subject_id) DO UPDATE SET
                subject_kind = EXCLUDED.subject_kind,
                course_id = COALESCE(EXCLUDED.course_id, completion_records.course_id),
                completed = EXCLUDED.completed,
                xp_earned = EXCLUDED.xp_earned,
                completed_at = EXCLUDED.completed_at
            RETURNING user_id, subject_id, subject_kind, course_id, completed, xp_earned, completed_at
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.subject_id)
        .bind(record.subject_kind.as_str())
        .bind(&record.course_id)
        .bind(record.completed)
        .bind(record.xp_earned)
        .bind(record.completed_at)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert completion record: {:?}", e);
            StoreError::Database(e)
        })?;

        CompletionRecord::try_from(row)
    }

    async fn increment_xp(
        &mut self,
        user_id: &str,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        // Single server-side increment; never read-then-write from here.
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET total_xp = total_xp + $2, last_activity = $3
            WHERE id = $1
            RETURNING total_xp
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .bind(at)
        .fetch_optional(self.conn()?)
        .await?;

        total.ok_or_else(|| StoreError::user_not_found(user_id))
    }

    async fn set_level(&mut self, user_id: &str, level: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET level = $2 WHERE id = $1")
            .bind(user_id)
            .bind(level)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn set_streak(
        &mut self,
        user_id: &str,
        streak: i64,
        longest_streak: i64,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET streak = $2, longest_streak = $3 WHERE id = $1")
            .bind(user_id)
            .bind(streak)
            .bind(longest_streak)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn count_completed(
        &mut self,
        user_id: &str,
        kind: SubjectKind,
    ) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM completion_records
            WHERE user_id = $1 AND subject_kind = $2 AND completed
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_one(self.conn()?)
        .await?;

        Ok(count)
    }

    async fn unlock_achievement(
        &mut self,
        user_id: &str,
        achievement_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_achievements (user_id, achievement_id, unlocked_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, achievement_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(achievement_id)
        .bind(at)
        .execute(self.conn()?)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::Closed)?;
        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit transaction: {:?}", e);
            StoreError::Database(e)
        })
    }
}
