//! Pure quiz-session logic: no I/O, no clocks other than the ones passed in.
//!
//! Everything here is shared by the HTTP service and the client-side attempt
//! driver, so both sides agree on what a valid transition is.

pub mod aggregation;
pub mod integrity;
pub mod scoring;
pub mod session;

use thiserror::Error;

/// Rejections raised synchronously by the state machine. State is unchanged
/// whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("question index {index} is out of range (quiz has {len} questions)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("question {0} does not belong to this quiz")]
    UnknownQuestion(i64),

    #[error("'{option}' is not an option of question {question_id}")]
    InvalidOption { question_id: i64, option: String },

    #[error("{answered} of {total} questions answered; answer every question before submitting")]
    IncompleteSubmission { answered: usize, total: usize },
}

/// Benign reasons a mutation was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// The session is completed and accepts no further mutation.
    SessionClosed,
    /// The payload carried more remaining time than is stored.
    StaleProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored(Ignored),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}
