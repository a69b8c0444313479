// src/services/attempt.rs

//! Participant-side operations on a session: load, autosave, submit, and
//! integrity reports.
//!
//! Every write is a compare-and-swap on the session version. A writer that
//! loses re-reads and re-applies its change; after `MAX_COMMIT_ATTEMPTS` lost
//! races the request fails with 409.

use chrono::{DateTime, Utc};

use crate::{
    config::MAX_COMMIT_ATTEMPTS,
    engine::{
        Ignored, Outcome,
        integrity::classify,
        scoring::score_submission,
    },
    error::AppError,
    models::{
        quiz::{PublicQuiz, Quiz},
        session::{
            AckStatus, Answer, AttemptResponse, ProgressAck, SaveProgressRequest, Session,
            SessionView, SubmitReason, SubmitRequest, ViolationRequest,
        },
        submission::{NewSubmission, Submission, SubmissionResult, SubmitTrigger},
    },
    services::quizzes::require_quiz,
    store::QuizStore,
};

/// Loads (creating on first access) the participant's attempt.
///
/// An attempt whose clock ran out while nobody was watching is submitted here
/// as timer-expired, so the response already carries its result.
pub async fn load_attempt(
    store: &dyn QuizStore,
    participant_id: i64,
    quiz_id: i64,
    now: DateTime<Utc>,
) -> Result<AttemptResponse, AppError> {
    let quiz = require_quiz(store, quiz_id).await?;

    for _ in 0..MAX_COMMIT_ATTEMPTS {
        let session = store.load_or_create_session(participant_id, &quiz, now).await?;
        if session.completed {
            let result = stored_result(store, &session, &quiz).await?;
            return Ok(attempt_response(&quiz, &session, Some(result)));
        }

        // The ticked copy is only a view; the stored anchor stays put, so the
        // next charge covers the same span.
        let mut current = session.clone();
        current.tick(now);
        if !current.is_expired() {
            return Ok(attempt_response(&quiz, &current, None));
        }

        if let Some((closed, submission)) =
            complete(store, &quiz, current, SubmitTrigger::TimerExpired, now).await?
        {
            let result = score_submission(&submission, &quiz);
            return Ok(attempt_response(&quiz, &closed, Some(result)));
        }
        tracing::debug!(participant_id, quiz_id, "Lost race while expiring session, retrying");
    }

    Err(conflict(participant_id, quiz_id))
}

/// Server side of the autosave channel.
///
/// Benign outcomes (stale payload, closed session) are acknowledged with
/// status rather than raised as errors.
pub async fn save_progress(
    store: &dyn QuizStore,
    participant_id: i64,
    quiz_id: i64,
    update: &SaveProgressRequest,
    now: DateTime<Utc>,
) -> Result<ProgressAck, AppError> {
    let quiz = require_quiz(store, quiz_id).await?;

    for _ in 0..MAX_COMMIT_ATTEMPTS {
        let session = require_session(store, participant_id, quiz_id).await?;
        let mut next = session.clone();

        match next.apply_progress(&quiz, update, now)? {
            Outcome::Applied => {}
            Outcome::Ignored(Ignored::StaleProgress) => {
                tracing::debug!(
                    participant_id,
                    quiz_id,
                    claimed = update.time_left,
                    stored = session.time_left,
                    "Dropped stale progress"
                );
                return Ok(ack(AckStatus::Stale, &session, None));
            }
            Outcome::Ignored(Ignored::SessionClosed) => {
                tracing::debug!(participant_id, quiz_id, "Progress for a closed session");
                let submission = store.submission_for_session(session.id).await?;
                return Ok(ack(AckStatus::Closed, &session, submission.map(|s| s.id)));
            }
        }

        if next.is_expired() {
            match complete(store, &quiz, next, SubmitTrigger::TimerExpired, now).await? {
                Some((closed, submission)) => {
                    return Ok(ack(AckStatus::Expired, &closed, Some(submission.id)));
                }
                None => continue,
            }
        }

        if store.save_session(&next).await? {
            next.version += 1;
            return Ok(ack(AckStatus::Applied, &next, None));
        }
        tracing::debug!(participant_id, quiz_id, "Lost race while saving progress, retrying");
    }

    Err(conflict(participant_id, quiz_id))
}

/// Closes the attempt on the participant's request (or the client's timer).
///
/// Unsent answers are merged first. If the server clock has already run out
/// (or the claimed `time_left` brings it to zero) the submission is recorded as
/// timer-expired; otherwise it is explicit and must cover every question.
/// Submitting a completed attempt returns its original result.
pub async fn submit(
    store: &dyn QuizStore,
    participant_id: i64,
    quiz_id: i64,
    req: &SubmitRequest,
    now: DateTime<Utc>,
) -> Result<SubmissionResult, AppError> {
    let quiz = require_quiz(store, quiz_id).await?;

    for _ in 0..MAX_COMMIT_ATTEMPTS {
        let session = require_session(store, participant_id, quiz_id).await?;
        if session.completed {
            return stored_result(store, &session, &quiz).await;
        }

        let mut next = session.clone();
        next.tick(now);
        if let Some(claimed) = req.time_left {
            next.time_left = next.time_left.min(claimed);
        }

        // A claimed expiry only counts once the clock agrees.
        let trigger = if next.is_expired() {
            merge_forced(&mut next, &quiz, &req.answers);
            SubmitTrigger::TimerExpired
        } else {
            if req.reason == SubmitReason::TimerExpired {
                tracing::debug!(
                    participant_id,
                    quiz_id,
                    time_left = next.time_left,
                    "Timer expiry claimed with time left, treating as explicit"
                );
            }
            next.merge_answers(&quiz, &req.answers)?;
            SubmitTrigger::Explicit
        };

        if let Some((_, submission)) = complete(store, &quiz, next, trigger, now).await? {
            return Ok(score_submission(&submission, &quiz));
        }
        tracing::debug!(participant_id, quiz_id, "Lost race while submitting, retrying");
    }

    Err(conflict(participant_id, quiz_id))
}

/// Forced submission after a client-side integrity violation.
pub async fn report_violation(
    store: &dyn QuizStore,
    participant_id: i64,
    quiz_id: i64,
    req: &ViolationRequest,
    now: DateTime<Utc>,
) -> Result<SubmissionResult, AppError> {
    let kind = classify(&req.event)
        .ok_or_else(|| AppError::BadRequest("Event is not an integrity violation".to_string()))?;
    let quiz = require_quiz(store, quiz_id).await?;

    for _ in 0..MAX_COMMIT_ATTEMPTS {
        let session = require_session(store, participant_id, quiz_id).await?;
        if session.completed {
            return stored_result(store, &session, &quiz).await;
        }

        let mut next = session.clone();
        merge_forced(&mut next, &quiz, &req.answers);
        next.tick(now);

        let trigger = SubmitTrigger::IntegrityViolation { kind };
        if let Some((_, submission)) = complete(store, &quiz, next, trigger, now).await? {
            return Ok(score_submission(&submission, &quiz));
        }
        tracing::debug!(participant_id, quiz_id, "Lost race while reporting violation, retrying");
    }

    Err(conflict(participant_id, quiz_id))
}

/// Finalizes `session` and commits it together with its submission.
///
/// `Ok(None)` means the compare failed (or the session was already closed);
/// the caller re-reads.
async fn complete(
    store: &dyn QuizStore,
    quiz: &Quiz,
    mut session: Session,
    trigger: SubmitTrigger,
    now: DateTime<Utc>,
) -> Result<Option<(Session, Submission)>, AppError> {
    let Some(answers) = session.finalize(quiz, trigger)? else {
        return Ok(None);
    };

    let submission = NewSubmission {
        session_id: session.id,
        participant_id: session.participant_id,
        quiz_id: session.quiz_id,
        answers,
        trigger,
        submitted_at: now,
    };

    let Some(stored) = store.complete_session(&session, submission).await? else {
        return Ok(None);
    };

    if trigger.is_forced() {
        tracing::info!(
            participant_id = session.participant_id,
            quiz_id = session.quiz_id,
            submission_id = stored.id,
            "Forced submission: {:?}",
            trigger
        );
    } else {
        tracing::info!(
            participant_id = session.participant_id,
            quiz_id = session.quiz_id,
            submission_id = stored.id,
            "Attempt submitted"
        );
    }

    session.version += 1;
    Ok(Some((session, stored)))
}

/// Merges what it can of the unsent answers; a forced submission goes through
/// regardless.
fn merge_forced(session: &mut Session, quiz: &Quiz, answers: &[Answer]) {
    for rejected in session.merge_valid_answers(quiz, answers) {
        tracing::warn!(
            participant_id = session.participant_id,
            quiz_id = session.quiz_id,
            "Dropped answer on forced submission: {}",
            rejected
        );
    }
}

async fn require_session(
    store: &dyn QuizStore,
    participant_id: i64,
    quiz_id: i64,
) -> Result<Session, AppError> {
    store
        .get_session(participant_id, quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No attempt for quiz {}", quiz_id)))
}

/// The original result of a completed session.
async fn stored_result(
    store: &dyn QuizStore,
    session: &Session,
    quiz: &Quiz,
) -> Result<SubmissionResult, AppError> {
    let submission = store.submission_for_session(session.id).await?.ok_or_else(|| {
        AppError::InternalServerError(format!("Completed session {} has no submission", session.id))
    })?;
    Ok(score_submission(&submission, quiz))
}

fn attempt_response(quiz: &Quiz, session: &Session, result: Option<SubmissionResult>) -> AttemptResponse {
    AttemptResponse {
        quiz: PublicQuiz::from(quiz),
        session: SessionView::from(session),
        result,
    }
}

fn ack(status: AckStatus, session: &Session, submission_id: Option<i64>) -> ProgressAck {
    ProgressAck {
        status,
        current_index: session.current_index,
        time_left: session.time_left,
        completed: session.completed,
        submission_id,
    }
}

fn conflict(participant_id: i64, quiz_id: i64) -> AppError {
    tracing::warn!(participant_id, quiz_id, "Gave up after repeated write conflicts");
    AppError::Conflict("Session is being modified concurrently, retry".to_string())
}
