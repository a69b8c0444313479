// src/handlers/report.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        report::{DistributionReport, LeaderboardParams, PopulationParams},
        submission::{LeaderboardEntry, Submission, SubmissionResult},
    },
    services::reports,
    store::QuizStore,
    utils::jwt::Claims,
};

/// All submissions for a quiz (evaluator only).
#[utoipa::path(
    get,
    path = "/api/quizzes/{quiz_id}/submissions",
    params(("quiz_id" = i64, Path, description = "Quiz ID")),
    responses(
        (status = 200, body = [Submission]),
        (status = 404, description = "Quiz not found")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn quiz_submissions(
    State(store): State<Arc<dyn QuizStore>>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let submissions = reports::quiz_submissions(store.as_ref(), quiz_id).await?;
    Ok(Json(submissions))
}

/// Per-category answer distribution for a cohort or a single participant.
#[utoipa::path(
    get,
    path = "/api/quizzes/{quiz_id}/distribution",
    params(("quiz_id" = i64, Path, description = "Quiz ID"), PopulationParams),
    responses(
        (status = 200, body = DistributionReport),
        (status = 404, description = "Quiz not found")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn distribution(
    State(store): State<Arc<dyn QuizStore>>,
    Path(quiz_id): Path<i64>,
    Query(params): Query<PopulationParams>,
) -> Result<impl IntoResponse, AppError> {
    let report = reports::distribution(store.as_ref(), quiz_id, params.participant_id).await?;
    Ok(Json(report))
}

/// Top scores for a quiz.
#[utoipa::path(
    get,
    path = "/api/quizzes/{quiz_id}/leaderboard",
    params(("quiz_id" = i64, Path, description = "Quiz ID"), LeaderboardParams),
    responses(
        (status = 200, body = [LeaderboardEntry]),
        (status = 404, description = "Quiz not found")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn leaderboard(
    State(store): State<Arc<dyn QuizStore>>,
    Path(quiz_id): Path<i64>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let entries = reports::leaderboard(store.as_ref(), quiz_id, params.limit).await?;
    Ok(Json(entries))
}

/// All submissions by one participant (evaluator only).
#[utoipa::path(
    get,
    path = "/api/participants/{participant_id}/submissions",
    params(("participant_id" = i64, Path, description = "Participant ID")),
    responses((status = 200, body = [Submission])),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn participant_submissions(
    State(store): State<Arc<dyn QuizStore>>,
    Path(participant_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let submissions = reports::participant_submissions(store.as_ref(), participant_id).await?;
    Ok(Json(submissions))
}

/// The caller's own results.
#[utoipa::path(
    get,
    path = "/api/me/submissions",
    responses((status = 200, body = [SubmissionResult])),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn my_submissions(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let participant_id = claims.participant_id()?;
    let results = reports::participant_results(store.as_ref(), participant_id).await?;
    Ok(Json(results))
}

/// Re-scored result of one submission. Owners and evaluators only.
#[utoipa::path(
    get,
    path = "/api/submissions/{submission_id}/result",
    params(("submission_id" = i64, Path, description = "Submission ID")),
    responses(
        (status = 200, body = SubmissionResult),
        (status = 403, description = "Not your submission"),
        (status = 404, description = "Submission not found")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn submission_result(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let requester_id = claims.participant_id()?;
    let result = reports::submission_result(
        store.as_ref(),
        submission_id,
        requester_id,
        claims.is_evaluator(),
    )
    .await?;
    Ok(Json(result))
}
