// src/models/session.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    engine::integrity::ClientEvent,
    models::{quiz::PublicQuiz, submission::SubmissionResult},
};

/// One selected option for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Answer {
    pub question_id: i64,
    pub selected_option: String,
}

/// Server copy of a participant's attempt at a quiz.
///
/// There is at most one row per (participant, quiz). `NotStarted` is simply the
/// absence of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub participant_id: i64,
    pub quiz_id: i64,
    pub current_index: usize,
    /// One entry per answered question, in the order first answered.
    pub answers: Vec<Answer>,
    /// Remaining seconds. Never increases.
    pub time_left: u32,
    /// Wall-clock instant up to which `time_left` has been charged.
    pub clock_at: chrono::DateTime<chrono::Utc>,
    pub completed: bool,
    /// Bumped on every committed write; used for compare-and-swap.
    pub version: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

/// The part of a session a client gets to see.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionView {
    pub quiz_id: i64,
    pub status: SessionStatus,
    pub current_index: usize,
    pub answers: Vec<Answer>,
    pub time_left: u32,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        SessionView {
            quiz_id: session.quiz_id,
            status: session.status(),
            current_index: session.current_index,
            answers: session.answers.clone(),
            time_left: session.time_left,
        }
    }
}

/// Response of "load quiz for participant".
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttemptResponse {
    pub quiz: PublicQuiz,
    pub session: SessionView,
    /// Present once the session is completed.
    pub result: Option<SubmissionResult>,
}

/// Autosave payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveProgressRequest {
    pub current_index: usize,
    #[serde(default)]
    pub answers: Vec<Answer>,
    pub time_left: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    /// Payload stored.
    Applied,
    /// `time_left` was above the stored value; nothing changed.
    Stale,
    /// The session was already completed; nothing changed.
    Closed,
    /// The payload ran the clock out and the attempt was submitted.
    Expired,
}

/// Autosave acknowledgement. Carries the authoritative state so the client can
/// re-sync its timer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgressAck {
    pub status: AckStatus,
    pub current_index: usize,
    pub time_left: u32,
    pub completed: bool,
    pub submission_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubmitReason {
    #[default]
    Explicit,
    TimerExpired,
}

/// DTO for submitting an attempt.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitRequest {
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub reason: SubmitReason,
    /// Client-side remaining time, charged like an autosave if present.
    pub time_left: Option<u32>,
}

/// DTO for reporting an integrity violation observed by the client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ViolationRequest {
    pub event: ClientEvent,
    /// Answers not yet flushed by autosave.
    #[serde(default)]
    pub answers: Vec<Answer>,
}
