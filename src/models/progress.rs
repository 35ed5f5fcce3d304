// src/models/progress.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use validator::Validate;

use crate::{
    error::AppError,
    models::{achievement::UnlockedAchievement, user::UserProgress},
    utils::validation::{is_identifier, validate_identifier},
};

/// The kind of learning unit being completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Lesson,
    Challenge,
    Project,
}

impl SubjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectKind::Lesson => "lesson",
            SubjectKind::Challenge => "challenge",
            SubjectKind::Project => "project",
        }
    }

    /// Capitalized name used in user-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            SubjectKind::Lesson => "Lesson",
            SubjectKind::Challenge => "Challenge",
            SubjectKind::Project => "Project",
        }
    }

    /// JSON field carrying the subject id in completion requests.
    pub fn id_field(self) -> &'static str {
        match self {
            SubjectKind::Lesson => "lessonId",
            SubjectKind::Challenge => "challengeId",
            SubjectKind::Project => "projectId",
        }
    }

    /// Path segment of the completion endpoint, e.g. `/api/lessons/complete`.
    pub fn route_segment(self) -> &'static str {
        match self {
            SubjectKind::Lesson => "lessons",
            SubjectKind::Challenge => "challenges",
            SubjectKind::Project => "projects",
        }
    }

    /// XP granted when the request carries no `xp`, or `xp: 0`.
    pub fn default_xp(self) -> i64 {
        match self {
            SubjectKind::Lesson => 50,
            SubjectKind::Challenge => 50,
            SubjectKind::Project => 100,
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lesson" => Ok(SubjectKind::Lesson),
            "challenge" => Ok(SubjectKind::Challenge),
            "project" => Ok(SubjectKind::Project),
            other => Err(format!("unknown subject kind '{}'", other)),
        }
    }
}

/// Persisted fact that a user finished (or started) a subject.
/// `(user_id, subject_id)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub user_id: String,
    pub subject_id: String,
    pub subject_kind: SubjectKind,
    pub course_id: Option<String>,
    pub completed: bool,
    pub xp_earned: i64,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A validated completion event, ready for the ledger.
#[derive(Debug, Clone, Validate)]
pub struct CompletionEvent {
    #[validate(length(min = 1, max = 128), custom(function = validate_identifier))]
    pub user_id: String,

    #[validate(length(min = 1, max = 128), custom(function = validate_identifier))]
    pub subject_id: String,

    pub kind: SubjectKind,

    #[validate(range(min = 0, max = 10000))]
    pub xp: i64,

    #[validate(length(min = 1, max = 128))]
    pub course_id: Option<String>,
}

/// Raw fields of a completion request before validation.
#[derive(Debug, Default)]
pub struct CompletionParts {
    pub user_id: Option<String>,
    pub subject_id: Option<String>,
    pub xp: Option<i64>,
    pub course_id: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl CompletionParts {
    /// Checks required fields and builds the event, applying the default XP for `kind`.
    pub fn into_event(self, kind: SubjectKind) -> Result<CompletionEvent, AppError> {
        let (Some(user_id), Some(subject_id)) = (non_blank(self.user_id), non_blank(self.subject_id))
        else {
            return Err(AppError::BadRequest(format!(
                "userId and {} are required",
                kind.id_field()
            )));
        };

        let course_id = non_blank(self.course_id);
        if let Some(course_id) = &course_id {
            if !is_identifier(course_id) {
                return Err(AppError::BadRequest("courseId is not a valid identifier".into()));
            }
        }

        let event = CompletionEvent {
            user_id,
            subject_id,
            kind,
            xp: self
                .xp
                .filter(|xp| *xp != 0)
                .unwrap_or_else(|| kind.default_xp()),
            course_id,
        };
        event.validate()?;

        Ok(event)
    }
}

/// Implemented by the per-kind request bodies so one handler serves every kind.
pub trait CompletionPayload: DeserializeOwned + Send + 'static {
    const KIND: SubjectKind;

    fn into_parts(self) -> CompletionParts;
}

/// DTO for `POST /api/lessons/complete`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCompletionRequest {
    pub user_id: Option<String>,
    pub lesson_id: Option<String>,
    pub xp: Option<i64>,
    pub course_id: Option<String>,
}

impl CompletionPayload for LessonCompletionRequest {
    const KIND: SubjectKind = SubjectKind::Lesson;

    fn into_parts(self) -> CompletionParts {
        CompletionParts {
            user_id: self.user_id,
            subject_id: self.lesson_id,
            xp: self.xp,
            course_id: self.course_id,
        }
    }
}

/// DTO for `POST /api/challenges/complete`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeCompletionRequest {
    pub user_id: Option<String>,
    pub challenge_id: Option<String>,
    pub xp: Option<i64>,
    pub course_id: Option<String>,
}

impl CompletionPayload for ChallengeCompletionRequest {
    const KIND: SubjectKind = SubjectKind::Challenge;

    fn into_parts(self) -> CompletionParts {
        CompletionParts {
            user_id: self.user_id,
            subject_id: self.challenge_id,
            xp: self.xp,
            course_id: self.course_id,
        }
    }
}

/// DTO for `POST /api/projects/complete`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCompletionRequest {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub xp: Option<i64>,
    pub course_id: Option<String>,
}

impl CompletionPayload for ProjectCompletionRequest {
    const KIND: SubjectKind = SubjectKind::Project;

    fn into_parts(self) -> CompletionParts {
        CompletionParts {
            user_id: self.user_id,
            subject_id: self.project_id,
            xp: self.xp,
            course_id: self.course_id,
        }
    }
}

/// Body returned by every completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletionResponse {
    Completed(CompletionReceipt),
    AlreadyCompleted(AlreadyCompletedResponse),
}

/// First-time completion: the record plus the XP, level and achievement deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReceipt {
    pub progress: CompletionRecord,
    pub xp_earned: i64,
    #[serde(rename = "totalXP")]
    pub total_xp: i64,
    pub new_level: i64,
    pub leveled_up: bool,
    pub achievements: Vec<UnlockedAchievement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlreadyCompletedResponse {
    pub message: String,
    pub already_completed: bool,
    pub xp_earned: i64,
}

impl AlreadyCompletedResponse {
    pub fn for_kind(kind: SubjectKind) -> Self {
        Self {
            message: format!("{} already completed", kind.label()),
            already_completed: true,
            xp_earned: 0,
        }
    }
}

/// Query string of `GET /api/progress/course/{courseId}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgressParams {
    pub user_id: Option<String>,
}

/// Everything a course page needs to render completion state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub completed_projects: Vec<String>,
    pub completed_challenges: Vec<String>,
    pub completed_lessons: Vec<String>,
    pub user: UserSummary,
    #[serde(rename = "totalXPEarned")]
    pub total_xp_earned: i64,
}

impl CourseProgress {
    /// Splits a user's completed records for one course into per-kind id lists.
    /// A missing user yields the starting summary (0 XP, level 1).
    pub fn from_records(records: Vec<CompletionRecord>, user: Option<&UserProgress>) -> Self {
        let mut progress = CourseProgress {
            user: user.map(UserSummary::from).unwrap_or_default(),
            ..Default::default()
        };

        for record in records.into_iter().filter(|r| r.completed) {
            progress.total_xp_earned += record.xp_earned;
            let bucket = match record.subject_kind {
                SubjectKind::Lesson => &mut progress.completed_lessons,
                SubjectKind::Challenge => &mut progress.completed_challenges,
                SubjectKind::Project => &mut progress.completed_projects,
            };
            bucket.push(record.subject_id);
        }

        progress
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "totalXP")]
    pub total_xp: i64,
    pub level: i64,
    pub streak: i64,
}

impl Default for UserSummary {
    fn default() -> Self {
        Self {
            total_xp: 0,
            level: 1,
            streak: 0,
        }
    }
}

impl From<&UserProgress> for UserSummary {
    fn from(user: &UserProgress) -> Self {
        Self {
            total_xp: user.total_xp,
            level: user.level,
            streak: user.streak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(user: Option<&str>, subject: Option<&str>, xp: Option<i64>) -> CompletionParts {
        CompletionParts {
            user_id: user.map(String::from),
            subject_id: subject.map(String::from),
            xp,
            course_id: None,
        }
    }

    #[test]
    fn test_missing_user_id_is_rejected() {
        let err = parts(None, Some("lesson-1"), None)
            .into_event(SubjectKind::Lesson)
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "userId and lessonId are required"));
    }

    #[test]
    fn test_blank_subject_id_counts_as_missing() {
        let err = parts(Some("u1"), Some("  "), None)
            .into_event(SubjectKind::Challenge)
            .unwrap_err();
        assert!(
            matches!(err, AppError::BadRequest(ref m) if m == "userId and challengeId are required")
        );
    }

    #[test]
    fn test_default_xp_per_kind() {
        let lesson = parts(Some("u1"), Some("l1"), None)
            .into_event(SubjectKind::Lesson)
            .unwrap();
        assert_eq!(lesson.xp, 50);

        let project = parts(Some("u1"), Some("p1"), None)
            .into_event(SubjectKind::Project)
            .unwrap();
        assert_eq!(project.xp, 100);
    }

    #[test]
    fn test_explicit_xp_is_kept() {
        let event = parts(Some("u1"), Some("l1"), Some(30))
            .into_event(SubjectKind::Lesson)
            .unwrap();
        assert_eq!(event.xp, 30);
    }

    #[test]
    fn test_zero_xp_falls_back_to_default() {
        let lesson = parts(Some("u1"), Some("l1"), Some(0))
            .into_event(SubjectKind::Lesson)
            .unwrap();
        assert_eq!(lesson.xp, 50);

        let project = parts(Some("u1"), Some("p1"), Some(0))
            .into_event(SubjectKind::Project)
            .unwrap();
        assert_eq!(project.xp, 100);
    }

    #[test]
    fn test_negative_xp_is_rejected() {
        let err = parts(Some("u1"), Some("l1"), Some(-5))
            .into_event(SubjectKind::Lesson)
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_malformed_identifier_is_rejected() {
        let err = parts(Some("u1"), Some("lesson one"), None)
            .into_event(SubjectKind::Lesson)
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_lesson_request_uses_camel_case_fields() {
        let req: LessonCompletionRequest = serde_json::from_value(serde_json::json!({
            "userId": "u1",
            "lessonId": "react-hooks-1",
            "courseId": "react"
        }))
        .unwrap();

        let event = req.into_parts().into_event(LessonCompletionRequest::KIND).unwrap();
        assert_eq!(event.subject_id, "react-hooks-1");
        assert_eq!(event.course_id.as_deref(), Some("react"));
    }

    #[test]
    fn test_already_completed_shape() {
        let body = serde_json::to_value(CompletionResponse::AlreadyCompleted(
            AlreadyCompletedResponse::for_kind(SubjectKind::Lesson),
        ))
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "message": "Lesson already completed",
                "alreadyCompleted": true,
                "xpEarned": 0
            })
        );
    }

    #[test]
    fn test_course_progress_buckets_by_kind() {
        let record = |id: &str, kind: SubjectKind, xp: i64| CompletionRecord {
            user_id: "u1".into(),
            subject_id: id.into(),
            subject_kind: kind,
            course_id: Some("python".into()),
            completed: true,
            xp_earned: xp,
            completed_at: Some(Utc::now()),
        };
        let mut user = UserProgress::new("u1".into(), None, Utc::now());
        user.total_xp = 250;
        user.level = 3;

        let progress = CourseProgress::from_records(
            vec![
                record("py-1", SubjectKind::Lesson, 50),
                record("py-boss", SubjectKind::Challenge, 100),
                record("py-cli", SubjectKind::Project, 100),
            ],
            Some(&user),
        );

        assert_eq!(progress.completed_lessons, vec!["py-1"]);
        assert_eq!(progress.completed_challenges, vec!["py-boss"]);
        assert_eq!(progress.completed_projects, vec!["py-cli"]);
        assert_eq!(progress.total_xp_earned, 250);
        assert_eq!(progress.user.level, 3);
    }

    #[test]
    fn test_course_progress_defaults_for_unknown_user() {
        let value = serde_json::to_value(CourseProgress::from_records(vec![], None)).unwrap();
        assert_eq!(value["user"], serde_json::json!({ "totalXP": 0, "level": 1, "streak": 0 }));
        assert_eq!(value["totalXPEarned"], 0);
    }

    #[test]
    fn test_receipt_round_trips_through_untagged_enum() {
        let receipt = CompletionReceipt {
            progress: CompletionRecord {
                user_id: "u1".into(),
                subject_id: "c1".into(),
                subject_kind: SubjectKind::Challenge,
                course_id: None,
                completed: true,
                xp_earned: 100,
                completed_at: Some(Utc::now()),
            },
            xp_earned: 100,
            total_xp: 180,
            new_level: 2,
            leveled_up: true,
            achievements: vec![],
        };

        let value = serde_json::to_value(CompletionResponse::Completed(receipt)).unwrap();
        assert_eq!(value["totalXP"], 180);
        assert_eq!(value["progress"]["subjectKind"], "challenge");

        let parsed: CompletionResponse = serde_json::from_value(value).unwrap();
        assert!(matches!(parsed, CompletionResponse::Completed(r) if r.new_level == 2));
    }
}
