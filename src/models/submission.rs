// src/models/submission.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{engine::integrity::ViolationKind, models::session::Answer};

/// What closed the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubmitTrigger {
    Explicit,
    TimerExpired,
    IntegrityViolation { kind: ViolationKind },
}

impl SubmitTrigger {
    /// Forced submissions may be incomplete.
    pub fn is_forced(&self) -> bool {
        !matches!(self, SubmitTrigger::Explicit)
    }

    /// Column representation: (trigger, violation kind).
    pub fn to_columns(&self) -> (&'static str, Option<&'static str>) {
        match self {
            SubmitTrigger::Explicit => ("explicit", None),
            SubmitTrigger::TimerExpired => ("timer_expired", None),
            SubmitTrigger::IntegrityViolation { kind } => ("integrity_violation", Some(kind.as_str())),
        }
    }

    pub fn from_columns(trigger: &str, violation: Option<&str>) -> Option<Self> {
        match (trigger, violation) {
            ("explicit", _) => Some(SubmitTrigger::Explicit),
            ("timer_expired", _) => Some(SubmitTrigger::TimerExpired),
            ("integrity_violation", Some(kind)) => kind
                .parse()
                .ok()
                .map(|kind| SubmitTrigger::IntegrityViolation { kind }),
            _ => None,
        }
    }
}

/// Frozen record of a completed attempt. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Submission {
    pub id: i64,
    pub session_id: i64,
    pub participant_id: i64,
    pub quiz_id: i64,
    pub answers: Vec<Answer>,
    pub trigger: SubmitTrigger,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Submission content handed to the store together with the completing session.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub session_id: i64,
    pub participant_id: i64,
    pub quiz_id: i64,
    pub answers: Vec<Answer>,
    pub trigger: SubmitTrigger,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Per-question scoring detail. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScoredAnswer {
    pub question_id: i64,
    pub selected_option: Option<String>,
    pub correct_answer: Option<String>,
    pub is_correct: bool,
    pub marks_awarded: f64,
}

/// Participant-facing result of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubmissionResult {
    pub submission_id: i64,
    pub score: f64,
    pub total_questions: usize,
    pub answer_details: Vec<ScoredAnswer>,
    pub trigger: SubmitTrigger,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// A row of a quiz's leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntry {
    pub participant_id: i64,
    pub submission_id: i64,
    pub score: f64,
    pub total_questions: usize,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}
