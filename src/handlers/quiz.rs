// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    config::Config,
    error::AppError,
    models::{
        quiz::{CreateQuizRequest, Quiz, QuizSummary},
        session::AttemptResponse,
    },
    services::{attempt, quizzes},
    store::QuizStore,
    utils::jwt::Claims,
};

/// Create a quiz (evaluator only).
///
/// * Validates structure, option sets and correct answers.
/// * Sanitizes titles, category names and prompts.
/// * Falls back to the configured default time limit.
#[utoipa::path(
    post,
    path = "/api/quizzes",
    request_body = CreateQuizRequest,
    responses(
        (status = 201, description = "Quiz created", body = Quiz),
        (status = 400, description = "Invalid quiz"),
        (status = 403, description = "Evaluator role required")
    ),
    security(("bearer_auth" = [])),
    tag = "quizzes"
)]
pub async fn create_quiz(
    State(store): State<Arc<dyn QuizStore>>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let author_id = claims.participant_id()?;
    let quiz = quizzes::create_quiz(
        store.as_ref(),
        req,
        author_id,
        config.default_time_limit_secs,
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// List available quizzes, newest first.
#[utoipa::path(
    get,
    path = "/api/quizzes",
    responses((status = 200, body = [QuizSummary])),
    security(("bearer_auth" = [])),
    tag = "quizzes"
)]
pub async fn list_quizzes(State(store): State<Arc<dyn QuizStore>>) -> Result<impl IntoResponse, AppError> {
    let quizzes = quizzes::list_quizzes(store.as_ref()).await?;
    Ok(Json(quizzes))
}

/// Full quiz definition including correct answers (evaluator only).
#[utoipa::path(
    get,
    path = "/api/quizzes/{quiz_id}",
    params(("quiz_id" = i64, Path, description = "Quiz ID")),
    responses(
        (status = 200, body = Quiz),
        (status = 404, description = "Quiz not found")
    ),
    security(("bearer_auth" = [])),
    tag = "quizzes"
)]
pub async fn get_quiz(
    State(store): State<Arc<dyn QuizStore>>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quizzes::require_quiz(store.as_ref(), quiz_id).await?;
    Ok(Json(quiz))
}

/// Load the caller's attempt, starting it on first access.
///
/// Returns the quiz without correct answers, the session state, and the
/// result once the attempt is completed.
#[utoipa::path(
    get,
    path = "/api/quizzes/{quiz_id}/attempt",
    params(("quiz_id" = i64, Path, description = "Quiz ID")),
    responses(
        (status = 200, body = AttemptResponse),
        (status = 404, description = "Quiz not found")
    ),
    security(("bearer_auth" = [])),
    tag = "attempts"
)]
pub async fn load_attempt(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let participant_id = claims.participant_id()?;
    let response = attempt::load_attempt(store.as_ref(), participant_id, quiz_id, Utc::now()).await?;
    Ok(Json(response))
}
