// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{health, leaderboard, progress, users},
    models::progress::{
        ChallengeCompletionRequest, LessonCompletionRequest, ProjectCompletionRequest,
    },
    state::AppState,
};

/// Assembles the main application router.
///
/// * One generic completion handler serves lessons, challenges and projects.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store + config).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let completion_routes = Router::new()
        .route(
            "/api/lessons/complete",
            post(progress::complete::<LessonCompletionRequest>),
        )
        .route(
            "/api/challenges/complete",
            post(progress::complete::<ChallengeCompletionRequest>),
        )
        .route(
            "/api/projects/complete",
            post(progress::complete::<ProjectCompletionRequest>),
        );

    let progress_routes =
        Router::new().route("/course/{course_id}", get(progress::get_course_progress));

    let user_routes = Router::new()
        .route("/", post(users::create_user))
        .route("/{id}", get(users::get_user));

    Router::new()
        .merge(completion_routes)
        .nest("/api/progress", progress_routes)
        .nest("/api/users", user_routes)
        .route("/api/leaderboard", get(leaderboard::get_leaderboard))
        .route("/api/health", get(health::health_check))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
