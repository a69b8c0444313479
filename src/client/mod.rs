//! Participant-side attempt driver.
//!
//! Mirrors the server state machine locally so the quiz page can react without
//! a round trip, and keeps the server copy current through the autosave
//! channel. The network is behind [`AttemptTransport`].

pub mod attempt;
pub mod autosave;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    engine::EngineError,
    models::{
        session::{AttemptResponse, ProgressAck, SaveProgressRequest, SubmitRequest, ViolationRequest},
        submission::SubmissionResult,
    },
};

pub use attempt::Attempt;
pub use autosave::AutosaveChannel;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport failed: {0}")]
    Transport(String),

    #[error("server rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("move to the last question before submitting")]
    NotOnLastQuestion,

    #[error("the attempt is already completed")]
    Completed,
}

/// Calls against one participant's attempt at one quiz.
#[async_trait]
pub trait AttemptTransport: Send + Sync {
    async fn load(&self) -> Result<AttemptResponse, ClientError>;

    async fn save_progress(&self, update: &SaveProgressRequest) -> Result<ProgressAck, ClientError>;

    async fn submit(&self, req: &SubmitRequest) -> Result<SubmissionResult, ClientError>;

    async fn report_violation(&self, req: &ViolationRequest) -> Result<SubmissionResult, ClientError>;
}
