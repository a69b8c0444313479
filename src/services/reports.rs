// src/services/reports.rs

use std::collections::HashMap;

use crate::{
    config::{LEADERBOARD_MAX, LEADERBOARD_SIZE},
    engine::{
        aggregation::{category_distribution, overall_distribution},
        scoring::score_submission,
    },
    error::AppError,
    models::{
        quiz::Quiz,
        report::DistributionReport,
        submission::{LeaderboardEntry, Submission, SubmissionResult},
    },
    services::quizzes::require_quiz,
    store::{QuizStore, SubmissionFilter},
};

/// All submissions for a quiz, oldest first.
pub async fn quiz_submissions(store: &dyn QuizStore, quiz_id: i64) -> Result<Vec<Submission>, AppError> {
    require_quiz(store, quiz_id).await?;
    store.list_submissions(SubmissionFilter::quiz(quiz_id)).await
}

/// All submissions by a participant, across quizzes.
pub async fn participant_submissions(
    store: &dyn QuizStore,
    participant_id: i64,
) -> Result<Vec<Submission>, AppError> {
    store
        .list_submissions(SubmissionFilter::participant(participant_id))
        .await
}

/// A participant's own submissions, scored.
pub async fn participant_results(
    store: &dyn QuizStore,
    participant_id: i64,
) -> Result<Vec<SubmissionResult>, AppError> {
    let submissions = participant_submissions(store, participant_id).await?;

    let mut quizzes: HashMap<i64, Quiz> = HashMap::new();
    let mut results = Vec::with_capacity(submissions.len());
    for submission in &submissions {
        if !quizzes.contains_key(&submission.quiz_id) {
            let quiz = require_quiz(store, submission.quiz_id).await?;
            quizzes.insert(quiz.id, quiz);
        }
        if let Some(quiz) = quizzes.get(&submission.quiz_id) {
            results.push(score_submission(submission, quiz));
        }
    }
    Ok(results)
}

/// Re-scores a stored submission. Only its owner or an evaluator may read it.
pub async fn submission_result(
    store: &dyn QuizStore,
    submission_id: i64,
    requester_id: i64,
    is_evaluator: bool,
) -> Result<SubmissionResult, AppError> {
    let submission = store
        .get_submission(submission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Submission {} not found", submission_id)))?;

    if !is_evaluator && submission.participant_id != requester_id {
        return Err(AppError::Forbidden(
            "You can only view your own results".to_string(),
        ));
    }

    let quiz = require_quiz(store, submission.quiz_id).await?;
    Ok(score_submission(&submission, &quiz))
}

/// Per-category option distribution over the whole cohort, or over one
/// participant when `participant_id` is set.
pub async fn distribution(
    store: &dyn QuizStore,
    quiz_id: i64,
    participant_id: Option<i64>,
) -> Result<DistributionReport, AppError> {
    let quiz = require_quiz(store, quiz_id).await?;
    let submissions = store
        .list_submissions(SubmissionFilter {
            quiz_id: Some(quiz_id),
            participant_id,
        })
        .await?;

    Ok(DistributionReport {
        quiz_id,
        participant_id,
        submissions: submissions.len(),
        categories: category_distribution(&quiz, &submissions),
        overall: overall_distribution(&quiz, &submissions),
    })
}

/// Highest scores first; ties go to the earlier submission.
pub async fn leaderboard(
    store: &dyn QuizStore,
    quiz_id: i64,
    limit: Option<usize>,
) -> Result<Vec<LeaderboardEntry>, AppError> {
    let quiz = require_quiz(store, quiz_id).await?;
    let submissions = store.list_submissions(SubmissionFilter::quiz(quiz_id)).await?;
    let limit = limit.unwrap_or(LEADERBOARD_SIZE).clamp(1, LEADERBOARD_MAX);

    let mut entries: Vec<LeaderboardEntry> = submissions
        .iter()
        .map(|s| {
            let result = score_submission(s, &quiz);
            LeaderboardEntry {
                participant_id: s.participant_id,
                submission_id: s.id,
                score: result.score,
                total_questions: result.total_questions,
                submitted_at: s.submitted_at,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.submitted_at.cmp(&b.submitted_at))
            .then(a.submission_id.cmp(&b.submission_id))
    });
    entries.truncate(limit);
    Ok(entries)
}
