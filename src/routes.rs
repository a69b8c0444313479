// src/routes.rs

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{
    docs::ApiDoc,
    handlers::{quiz, report, session},
    state::AppState,
    utils::jwt::{auth_middleware, evaluator_middleware},
};

/// Assembles the main application router.
///
/// * Every `/api` route requires a bearer token; reports and authoring also
///   require the evaluator role.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store, config).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let evaluator_only = middleware::from_fn(evaluator_middleware);

    let participant_routes = Router::new()
        .route(
            "/quizzes",
            get(quiz::list_quizzes).merge(post(quiz::create_quiz).route_layer(evaluator_only.clone())),
        )
        .route("/quizzes/{quiz_id}/attempt", get(quiz::load_attempt))
        .route("/quizzes/{quiz_id}/progress", post(session::save_progress))
        .route("/quizzes/{quiz_id}/submit", post(session::submit))
        .route("/quizzes/{quiz_id}/violation", post(session::report_violation))
        .route("/me/submissions", get(report::my_submissions))
        .route("/submissions/{submission_id}/result", get(report::submission_result));

    let evaluator_routes = Router::new()
        .route("/quizzes/{quiz_id}", get(quiz::get_quiz))
        .route("/quizzes/{quiz_id}/submissions", get(report::quiz_submissions))
        .route("/quizzes/{quiz_id}/distribution", get(report::distribution))
        .route("/quizzes/{quiz_id}/leaderboard", get(report::leaderboard))
        .route(
            "/participants/{participant_id}/submissions",
            get(report::participant_submissions),
        )
        .layer(evaluator_only);

    // Auth runs first, then the evaluator check.
    let api_routes = participant_routes
        .merge(evaluator_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", api_routes)
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
