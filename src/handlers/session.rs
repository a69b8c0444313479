// src/handlers/session.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        session::{ProgressAck, SaveProgressRequest, SubmitRequest, ViolationRequest},
        submission::SubmissionResult,
    },
    services::attempt,
    store::QuizStore,
    utils::jwt::Claims,
};

/// Autosave endpoint.
///
/// Safe to replay. Stale payloads and saves against a completed attempt are
/// acknowledged (`stale` / `closed`) without changing anything.
#[utoipa::path(
    post,
    path = "/api/quizzes/{quiz_id}/progress",
    params(("quiz_id" = i64, Path, description = "Quiz ID")),
    request_body = SaveProgressRequest,
    responses(
        (status = 200, body = ProgressAck),
        (status = 400, description = "Index or answer not valid for this quiz"),
        (status = 404, description = "No attempt for this quiz"),
        (status = 409, description = "Concurrent writes, retry")
    ),
    security(("bearer_auth" = [])),
    tag = "attempts"
)]
pub async fn save_progress(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(req): Json<SaveProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    let participant_id = claims.participant_id()?;
    let ack = attempt::save_progress(store.as_ref(), participant_id, quiz_id, &req, Utc::now()).await?;
    Ok(Json(ack))
}

/// Submit the attempt.
///
/// An explicit submission must answer every question (422 otherwise).
/// Submitting a completed attempt returns the original result.
#[utoipa::path(
    post,
    path = "/api/quizzes/{quiz_id}/submit",
    params(("quiz_id" = i64, Path, description = "Quiz ID")),
    request_body = SubmitRequest,
    responses(
        (status = 200, body = SubmissionResult),
        (status = 400, description = "Answer not valid for this quiz"),
        (status = 404, description = "No attempt for this quiz"),
        (status = 422, description = "Unanswered questions")
    ),
    security(("bearer_auth" = [])),
    tag = "attempts"
)]
pub async fn submit(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let participant_id = claims.participant_id()?;
    let result = attempt::submit(store.as_ref(), participant_id, quiz_id, &req, Utc::now()).await?;
    Ok(Json(result))
}

/// Report an integrity violation; the attempt is submitted as is.
#[utoipa::path(
    post,
    path = "/api/quizzes/{quiz_id}/violation",
    params(("quiz_id" = i64, Path, description = "Quiz ID")),
    request_body = ViolationRequest,
    responses(
        (status = 200, body = SubmissionResult),
        (status = 400, description = "Event is not a violation"),
        (status = 404, description = "No attempt for this quiz")
    ),
    security(("bearer_auth" = [])),
    tag = "attempts"
)]
pub async fn report_violation(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(req): Json<ViolationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let participant_id = claims.participant_id()?;
    let result = attempt::report_violation(store.as_ref(), participant_id, quiz_id, &req, Utc::now()).await?;
    Ok(Json(result))
}
