//! Persistence seam for quizzes, sessions and submissions.
//!
//! Two backends share this trait: Postgres for deployments and an in-memory
//! map for tests and database-less runs. Both must give the same guarantees:
//! one session per (participant, quiz), compare-and-swap session writes, and a
//! completed session plus its submission committed together.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        quiz::{NewQuiz, Quiz, QuizSummary},
        session::Session,
        submission::{NewSubmission, Submission},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Which submissions to read. Empty filter means all of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionFilter {
    pub quiz_id: Option<i64>,
    pub participant_id: Option<i64>,
}

impl SubmissionFilter {
    pub fn quiz(quiz_id: i64) -> Self {
        SubmissionFilter {
            quiz_id: Some(quiz_id),
            participant_id: None,
        }
    }

    pub fn participant(participant_id: i64) -> Self {
        SubmissionFilter {
            quiz_id: None,
            participant_id: Some(participant_id),
        }
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        self.quiz_id.is_none_or(|id| submission.quiz_id == id)
            && self.participant_id.is_none_or(|id| submission.participant_id == id)
    }
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Stores a new quiz, assigning quiz and question identifiers.
    async fn create_quiz(&self, quiz: NewQuiz, now: DateTime<Utc>) -> Result<Quiz, AppError>;

    async fn get_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError>;

    /// Newest first.
    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, AppError>;

    /// Returns the participant's session for `quiz`, creating it atomically on
    /// first access. Concurrent first loads end up with the same row.
    async fn load_or_create_session(
        &self,
        participant_id: i64,
        quiz: &Quiz,
        now: DateTime<Utc>,
    ) -> Result<Session, AppError>;

    async fn get_session(&self, participant_id: i64, quiz_id: i64) -> Result<Option<Session>, AppError>;

    /// Writes `session` if the stored row still has `session.version` and is
    /// not completed. Returns `false` when the compare fails.
    async fn save_session(&self, session: &Session) -> Result<bool, AppError>;

    /// Marks the session completed (with its final state) and inserts the
    /// submission in one step, under the same compare as [`save_session`].
    /// Returns `None` when the compare fails.
    ///
    /// [`save_session`]: QuizStore::save_session
    async fn complete_session(
        &self,
        session: &Session,
        submission: NewSubmission,
    ) -> Result<Option<Submission>, AppError>;

    async fn submission_for_session(&self, session_id: i64) -> Result<Option<Submission>, AppError>;

    async fn get_submission(&self, submission_id: i64) -> Result<Option<Submission>, AppError>;

    /// Oldest first.
    async fn list_submissions(&self, filter: SubmissionFilter) -> Result<Vec<Submission>, AppError>;
}
