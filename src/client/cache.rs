// src/client/cache.rs

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    client::api::{ClientError, CompletionSubmission, ProgressApi},
    models::progress::{CompletionResponse, CourseProgress, SubjectKind},
};

/// Completion sets of one course.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed_lessons: HashSet<String>,
    pub completed_challenges: HashSet<String>,
    pub completed_projects: HashSet<String>,
    pub total_xp_earned: i64,
}

impl ProgressSnapshot {
    pub fn completed(&self, kind: SubjectKind) -> &HashSet<String> {
        match kind {
            SubjectKind::Lesson => &self.completed_lessons,
            SubjectKind::Challenge => &self.completed_challenges,
            SubjectKind::Project => &self.completed_projects,
        }
    }

    fn completed_mut(&mut self, kind: SubjectKind) -> &mut HashSet<String> {
        match kind {
            SubjectKind::Lesson => &mut self.completed_lessons,
            SubjectKind::Challenge => &mut self.completed_challenges,
            SubjectKind::Project => &mut self.completed_projects,
        }
    }
}

impl From<CourseProgress> for ProgressSnapshot {
    fn from(progress: CourseProgress) -> Self {
        Self {
            completed_lessons: progress.completed_lessons.into_iter().collect(),
            completed_challenges: progress.completed_challenges.into_iter().collect(),
            completed_projects: progress.completed_projects.into_iter().collect(),
            total_xp_earned: progress.total_xp_earned,
        }
    }
}

/// What a start/complete button for a subject should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectAction {
    Start,
    /// A completion request for the subject is in flight.
    Submitting,
    Completed,
}

impl SubjectAction {
    pub fn is_enabled(self) -> bool {
        matches!(self, SubjectAction::Start)
    }
}

#[derive(Debug)]
struct CacheState {
    courses: HashMap<String, ProgressSnapshot>,
    active_course: Option<String>,
    user_xp: i64,
    user_level: i64,
    loading: bool,
    /// Bumped by every `load_progress`; only the latest load may apply its result.
    load_generation: u64,
    in_flight: HashSet<(SubjectKind, String)>,
}

impl Default for CacheState {
    fn default() -> Self {
        Self {
            courses: HashMap::new(),
            active_course: None,
            user_xp: 0,
            user_level: 1,
            loading: false,
            load_generation: 0,
            in_flight: HashSet::new(),
        }
    }
}

fn write_state(state: &RwLock<CacheState>) -> RwLockWriteGuard<'_, CacheState> {
    state.write().unwrap_or_else(|e| e.into_inner())
}

/// Clears an in-flight marker when the submission finishes or is dropped.
struct InFlight<'a> {
    state: &'a RwLock<CacheState>,
    key: (SubjectKind, String),
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        write_state(self.state).in_flight.remove(&self.key);
    }
}

/// Per-course mirror of a user's completion records.
///
/// Snapshots are keyed by course id and only change through `load_progress`,
/// `evict` and the `mark_*_complete` calls. Reads are synchronous; the lock is
/// never held across a request.
pub struct ProgressCache<A> {
    api: A,
    user_id: String,
    state: RwLock<CacheState>,
}

impl<A: ProgressApi> ProgressCache<A> {
    pub fn new(api: A, user_id: impl Into<String>) -> Self {
        Self {
            api,
            user_id: user_id.into(),
            state: RwLock::new(CacheState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        write_state(&self.state)
    }

    /// Fetches the course snapshot and makes it the active course.
    ///
    /// `is_loading` is true while the latest load is in flight. A load overtaken by a
    /// later call returns `Ok(())` without touching the cache, even if it failed.
    pub async fn load_progress(&self, course_id: &str) -> Result<(), ClientError> {
        let generation = {
            let mut state = self.write();
            state.load_generation += 1;
            state.loading = true;
            state.load_generation
        };

        let result = self.api.course_progress(&self.user_id, course_id).await;

        let mut state = self.write();
        if state.load_generation != generation {
            tracing::debug!("Discarding superseded progress load for course {}", course_id);
            return Ok(());
        }
        state.loading = false;
        match result {
            Ok(progress) => {
                state.user_xp = progress.user.total_xp;
                state.user_level = progress.user.level;
                state
                    .courses
                    .insert(course_id.to_string(), ProgressSnapshot::from(progress));
                state.active_course = Some(course_id.to_string());
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error loading progress for course {}: {}", course_id, e);
                Err(e)
            }
        }
    }

    /// Drops a course snapshot; evicting the active course leaves none active.
    pub fn evict(&self, course_id: &str) {
        let mut state = self.write();
        state.courses.remove(course_id);
        if state.active_course.as_deref() == Some(course_id) {
            state.active_course = None;
        }
    }

    pub fn active_course(&self) -> Option<String> {
        self.read().active_course.clone()
    }

    pub fn snapshot(&self, course_id: &str) -> Option<ProgressSnapshot> {
        self.read().courses.get(course_id).cloned()
    }

    fn active_set(&self, kind: SubjectKind) -> HashSet<String> {
        let state = self.read();
        state
            .active_course
            .as_ref()
            .and_then(|course| state.courses.get(course))
            .map(|snapshot| snapshot.completed(kind).clone())
            .unwrap_or_default()
    }

    pub fn completed_lessons(&self) -> HashSet<String> {
        self.active_set(SubjectKind::Lesson)
    }

    pub fn completed_challenges(&self) -> HashSet<String> {
        self.active_set(SubjectKind::Challenge)
    }

    pub fn completed_projects(&self) -> HashSet<String> {
        self.active_set(SubjectKind::Project)
    }

    pub fn user_xp(&self) -> i64 {
        self.read().user_xp
    }

    pub fn user_level(&self) -> i64 {
        self.read().user_level
    }

    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    pub fn is_completed(&self, kind: SubjectKind, subject_id: &str) -> bool {
        let state = self.read();
        state
            .active_course
            .as_ref()
            .and_then(|course| state.courses.get(course))
            .is_some_and(|snapshot| snapshot.completed(kind).contains(subject_id))
    }

    pub fn action_for(&self, kind: SubjectKind, subject_id: &str) -> SubjectAction {
        if self.is_completed(kind, subject_id) {
            SubjectAction::Completed
        } else if self
            .read()
            .in_flight
            .contains(&(kind, subject_id.to_string()))
        {
            SubjectAction::Submitting
        } else {
            SubjectAction::Start
        }
    }

    pub async fn mark_lesson_complete(&self, lesson_id: &str, xp: i64) -> Result<(), ClientError> {
        self.mark_complete(SubjectKind::Lesson, lesson_id, xp).await
    }

    pub async fn mark_challenge_complete(
        &self,
        challenge_id: &str,
        xp: i64,
    ) -> Result<(), ClientError> {
        self.mark_complete(SubjectKind::Challenge, challenge_id, xp)
            .await
    }

    pub async fn mark_project_complete(&self, project_id: &str, xp: i64) -> Result<(), ClientError> {
        self.mark_complete(SubjectKind::Project, project_id, xp).await
    }

    /// Submits a completion for the active course and records it locally once the
    /// server confirms. Subjects already in the local set, or with a request still
    /// in flight, are not resubmitted.
    async fn mark_complete(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        xp: i64,
    ) -> Result<(), ClientError> {
        let course_id = self.active_course().ok_or(ClientError::NoActiveCourse)?;
        if self.is_completed(kind, subject_id) {
            return Ok(());
        }

        let key = (kind, subject_id.to_string());
        if !self.write().in_flight.insert(key.clone()) {
            return Ok(());
        }
        let _in_flight = InFlight {
            state: &self.state,
            key,
        };

        let submission = CompletionSubmission {
            user_id: self.user_id.clone(),
            kind,
            subject_id: subject_id.to_string(),
            xp: Some(xp),
            course_id: Some(course_id.clone()),
        };
        let response = self.api.submit_completion(&submission).await.map_err(|e| {
            tracing::error!("Error marking {} {} complete: {}", kind, subject_id, e);
            e
        })?;

        let mut state = self.write();
        if let CompletionResponse::Completed(receipt) = &response {
            state.user_xp = receipt.total_xp;
            state.user_level = receipt.new_level;
        }
        if let Some(snapshot) = state.courses.get_mut(&course_id) {
            snapshot.completed_mut(kind).insert(subject_id.to_string());
            if let CompletionResponse::Completed(receipt) = &response {
                snapshot.total_xp_earned += receipt.xp_earned;
            }
        }

        Ok(())
    }
}
