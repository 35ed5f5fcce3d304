// src/client/api.rs

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::models::progress::{CompletionResponse, CourseProgress, SubjectKind};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("no course progress loaded")]
    NoActiveCourse,
}

/// One completion to send to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSubmission {
    pub user_id: String,
    pub kind: SubjectKind,
    pub subject_id: String,
    pub xp: Option<i64>,
    pub course_id: Option<String>,
}

impl CompletionSubmission {
    /// Request body for the kind's endpoint, e.g. `{ "userId", "challengeId", "xp" }`.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("userId".into(), Value::from(self.user_id.clone()));
        body.insert(self.kind.id_field().into(), Value::from(self.subject_id.clone()));
        if let Some(xp) = self.xp {
            body.insert("xp".into(), Value::from(xp));
        }
        if let Some(course_id) = &self.course_id {
            body.insert("courseId".into(), Value::from(course_id.clone()));
        }
        Value::Object(body)
    }
}

/// Server operations the progress cache depends on.
#[async_trait]
pub trait ProgressApi: Send + Sync {
    async fn course_progress(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<CourseProgress, ClientError>;

    async fn submit_completion(
        &self,
        submission: &CompletionSubmission,
    ) -> Result<CompletionResponse, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpProgressApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProgressApi {
    /// `base_url` is the server origin, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body["error"].as_str().map(String::from))
        .unwrap_or_else(|| status.to_string());

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ProgressApi for HttpProgressApi {
    async fn course_progress(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<CourseProgress, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/progress/course/{}", self.base_url, course_id))
            .query(&[("userId", user_id)])
            .send()
            .await?;

        read_json(response).await
    }

    async fn submit_completion(
        &self,
        submission: &CompletionSubmission,
    ) -> Result<CompletionResponse, ClientError> {
        let response = self
            .client
            .post(format!(
                "{}/api/{}/complete",
                self.base_url,
                submission.kind.route_segment()
            ))
            .json(&submission.to_body())
            .send()
            .await?;

        read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_uses_kind_specific_id_field() {
        let submission = CompletionSubmission {
            user_id: "u1".into(),
            kind: SubjectKind::Project,
            subject_id: "todo-app".into(),
            xp: Some(150),
            course_id: Some("react".into()),
        };

        assert_eq!(
            submission.to_body(),
            serde_json::json!({
                "userId": "u1",
                "projectId": "todo-app",
                "xp": 150,
                "courseId": "react"
            })
        );
    }

    #[test]
    fn test_body_omits_absent_xp() {
        let submission = CompletionSubmission {
            user_id: "u1".into(),
            kind: SubjectKind::Lesson,
            subject_id: "l1".into(),
            xp: None,
            course_id: None,
        };

        assert_eq!(
            submission.to_body(),
            serde_json::json!({ "userId": "u1", "lessonId": "l1" })
        );
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let api = HttpProgressApi::new("http://localhost:3000/");
        assert_eq!(api.base_url, "http://localhost:3000");
    }
}
