// tests/postgres_store_tests.rs
//
// Runs the completion flow against a real Postgres database.
// Set DATABASE_URL and run with `--ignored`.

use std::sync::Arc;

use chrono::Utc;
use progress_backend::{
    models::{
        progress::{CompletionEvent, CompletionResponse, SubjectKind},
        user::UserProgress,
    },
    services::completion::complete_subject,
    store::{PgProgressStore, ProgressStore, StoreError},
};
use sqlx::postgres::PgPoolOptions;

async fn setup_store() -> PgProgressStore {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    PgProgressStore::new(pool)
}

async fn new_user(store: &PgProgressStore) -> String {
    let id = format!("pg_{}", uuid::Uuid::new_v4().simple());
    store
        .create_user(&UserProgress::new(id.clone(), None, Utc::now()))
        .await
        .expect("Failed to create user");
    id
}

fn event(user_id: &str, subject_id: &str, kind: SubjectKind, xp: i64) -> CompletionEvent {
    CompletionEvent {
        user_id: user_id.to_string(),
        subject_id: subject_id.to_string(),
        kind,
        xp,
        course_id: Some("react".to_string()),
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn completion_is_recorded_once() {
    let store = setup_store().await;
    let user = new_user(&store).await;
    let challenge = event(&user, "c1", SubjectKind::Challenge, 100);

    let first = complete_subject(&store, &challenge, Utc::now()).await.unwrap();
    let CompletionResponse::Completed(receipt) = first else {
        panic!("expected a first-time completion");
    };
    assert_eq!(receipt.total_xp, 100);
    assert_eq!(receipt.new_level, 2);
    assert!(receipt.leveled_up);

    let second = complete_subject(&store, &challenge, Utc::now()).await.unwrap();
    assert!(matches!(second, CompletionResponse::AlreadyCompleted(_)));

    let stored = store.find_user(&user).await.unwrap().unwrap();
    assert_eq!(stored.total_xp, 100);
    assert_eq!(stored.level, 2);

    let records = store.course_completions(&user, "react").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].subject_kind, SubjectKind::Challenge);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_completions_do_not_lose_xp() {
    let store = Arc::new(setup_store().await);
    let user = new_user(&store).await;

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let store = store.clone();
            let lesson = event(&user, &format!("lesson-{}", i), SubjectKind::Lesson, 20);
            tokio::spawn(async move { complete_subject(store.as_ref(), &lesson, Utc::now()).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = store.find_user(&user).await.unwrap().unwrap();
    assert_eq!(stored.total_xp, 200);
    assert_eq!(stored.level, 3);

    let achievements = store.user_achievements(&user).await.unwrap();
    assert!(achievements.iter().any(|(id, _)| id == "lesson-master"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn unknown_user_writes_nothing() {
    let store = setup_store().await;
    let ghost = format!("ghost_{}", uuid::Uuid::new_v4().simple());

    let err = complete_subject(&store, &event(&ghost, "l1", SubjectKind::Lesson, 50), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::NotFound { .. }));
    assert!(store.course_completions(&ghost, "react").await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_user_is_conflict() {
    let store = setup_store().await;
    let user = new_user(&store).await;

    let err = store
        .create_user(&UserProgress::new(user, None, Utc::now()))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Conflict(_)));
}
