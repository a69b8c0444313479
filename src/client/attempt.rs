// src/client/attempt.rs

use std::time::Duration;

use crate::{
    client::{AttemptTransport, ClientError, autosave::AutosaveChannel},
    engine::{
        EngineError, Outcome,
        integrity::{ClientEvent, IntegrityMonitor, MonitorState, ViolationKind},
    },
    models::{
        quiz::{Question, Quiz},
        session::{
            AckStatus, ProgressAck, SaveProgressRequest, Session, SessionStatus, SessionView, SubmitReason,
            SubmitRequest, ViolationRequest,
        },
        submission::SubmissionResult,
    },
};

/// A forced submission that has not reached the server yet.
#[derive(Debug, Clone)]
enum Forced {
    TimerExpired,
    Violation(ClientEvent),
}

/// One participant's attempt, as driven by the quiz page.
///
/// The integrity monitor is installed when the attempt starts, before the
/// first question is shown, and torn down once the attempt is completed.
pub struct Attempt<T> {
    transport: T,
    quiz: Quiz,
    session: Session,
    monitor: IntegrityMonitor,
    autosave: AutosaveChannel,
    /// Sub-second remainder of the local countdown.
    carry: Duration,
    pending: Option<Forced>,
    result: Option<SubmissionResult>,
}

impl<T: AttemptTransport> Attempt<T> {
    /// Loads the attempt from the server and arms the integrity monitor.
    pub async fn start(transport: T, autosave: AutosaveChannel) -> Result<Self, ClientError> {
        let loaded = transport.load().await?;
        let session = local_session(&loaded.session);

        let mut attempt = Attempt {
            transport,
            quiz: Quiz::from(loaded.quiz),
            session,
            monitor: IntegrityMonitor::new(),
            autosave,
            carry: Duration::ZERO,
            pending: None,
            result: None,
        };

        match loaded.result {
            Some(result) => attempt.finish(result),
            None => attempt.monitor.install(),
        }
        Ok(attempt)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.quiz.question_at(self.session.current_index)
    }

    pub fn result(&self) -> Option<&SubmissionResult> {
        self.result.as_ref()
    }

    pub fn is_completed(&self) -> bool {
        self.session.completed
    }

    pub fn monitor_state(&self) -> MonitorState {
        self.monitor.state()
    }

    /// Saves have kept failing; the page should warn the participant.
    pub fn is_degraded(&self) -> bool {
        self.autosave.is_degraded()
    }

    /// Picks an option for the current question and saves right away.
    pub async fn select_option(&mut self, option: &str) -> Result<Outcome, ClientError> {
        let index = self.session.current_index;
        let outcome = self.session.select_option(&self.quiz, index, option)?;
        if outcome.is_applied() {
            self.autosave.mark_dirty();
            self.flush().await;
        }
        Ok(outcome)
    }

    /// Moves to another question. Saved on the debounce schedule.
    pub async fn navigate(&mut self, target_index: usize) -> Result<Outcome, ClientError> {
        let outcome = self.session.navigate(&self.quiz, target_index)?;
        if outcome.is_applied() {
            self.autosave.mark_dirty();
            if self.autosave.debounce_elapsed() {
                self.flush().await;
            }
        }
        Ok(outcome)
    }

    /// Advances the local countdown by `elapsed`.
    ///
    /// Reaching zero submits the attempt as timer-expired. A forced submission
    /// that failed earlier is retried here.
    pub async fn tick(&mut self, elapsed: Duration) -> Result<(), ClientError> {
        if self.is_completed() {
            return Ok(());
        }

        self.autosave.advance(elapsed);
        let total = self.carry + elapsed;
        let seconds = total.as_secs();
        self.carry = total - Duration::from_secs(seconds);
        if seconds > 0 {
            self.session.count_down(u32::try_from(seconds).unwrap_or(u32::MAX));
            self.autosave.mark_dirty();
        }

        if self.session.is_expired() && self.pending.is_none() {
            tracing::info!(quiz_id = self.quiz.id, "Time is up, submitting");
            self.pending = Some(Forced::TimerExpired);
        }
        if self.pending.is_some() {
            return self.force_submit().await;
        }

        if self.autosave.debounce_elapsed() {
            self.flush().await;
        }
        Ok(())
    }

    /// Feeds a page event to the integrity monitor. The first violation
    /// submits the attempt; the kind is returned. A timer expiry still waiting
    /// to be delivered keeps its trigger.
    pub async fn on_event(&mut self, event: &ClientEvent) -> Result<Option<ViolationKind>, ClientError> {
        let Some(kind) = self.monitor.observe(event) else {
            return Ok(None);
        };
        if self.pending.is_none() {
            self.pending = Some(Forced::Violation(event.clone()));
        }
        self.force_submit().await?;
        Ok(Some(kind))
    }

    /// Explicit submission from the last question with every question
    /// answered.
    pub async fn submit(&mut self) -> Result<SubmissionResult, ClientError> {
        if self.is_completed() {
            return Err(ClientError::Completed);
        }

        let total = self.quiz.question_count();
        if self.session.current_index + 1 != total {
            return Err(ClientError::NotOnLastQuestion);
        }
        let answered = self.session.answered_count(&self.quiz);
        if answered < total {
            return Err(EngineError::IncompleteSubmission { answered, total }.into());
        }

        let req = SubmitRequest {
            answers: self.session.answers.clone(),
            reason: SubmitReason::Explicit,
            time_left: Some(self.session.time_left),
        };
        let result = self.transport.submit(&req).await?;
        self.finish(result.clone());
        Ok(result)
    }

    async fn force_submit(&mut self) -> Result<(), ClientError> {
        let Some(forced) = self.pending.clone() else {
            return Ok(());
        };

        let answers = self.session.answers.clone();
        let sent = match forced {
            Forced::TimerExpired => {
                let req = SubmitRequest {
                    answers,
                    reason: SubmitReason::TimerExpired,
                    time_left: Some(self.session.time_left),
                };
                self.transport.submit(&req).await
            }
            Forced::Violation(event) => {
                let req = ViolationRequest { event, answers };
                self.transport.report_violation(&req).await
            }
        };

        match sent {
            Ok(result) => {
                self.finish(result);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Forced submission failed, will retry");
                Err(e)
            }
        }
    }

    async fn flush(&mut self) {
        if !self.autosave.is_dirty() || self.is_completed() {
            return;
        }

        let update = SaveProgressRequest {
            current_index: self.session.current_index,
            answers: self.session.answers.clone(),
            time_left: self.session.time_left,
        };

        match self.transport.save_progress(&update).await {
            Ok(ack) => {
                self.autosave.record_success();
                self.apply_ack(ack).await;
            }
            Err(e) => {
                self.autosave.record_failure();
                tracing::warn!(
                    failures = self.autosave.consecutive_failures(),
                    error = %e,
                    "Autosave failed"
                );
            }
        }
    }

    async fn apply_ack(&mut self, ack: ProgressAck) {
        match ack.status {
            AckStatus::Applied | AckStatus::Stale => {
                self.session.time_left = self.session.time_left.min(ack.time_left);
            }
            AckStatus::Closed | AckStatus::Expired => {
                // The server closed the attempt; pick up its result.
                match self.transport.load().await {
                    Ok(loaded) => {
                        if let Some(result) = loaded.result {
                            self.finish(result);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Could not load result of closed attempt"),
                }
            }
        }
    }

    fn finish(&mut self, result: SubmissionResult) {
        self.session.completed = true;
        self.pending = None;
        self.result = Some(result);
        self.monitor.teardown();
    }
}

fn local_session(view: &SessionView) -> Session {
    let epoch = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
    Session {
        id: 0,
        participant_id: 0,
        quiz_id: view.quiz_id,
        current_index: view.current_index,
        answers: view.answers.clone(),
        time_left: view.time_left,
        clock_at: epoch,
        completed: view.status == SessionStatus::Completed,
        version: 0,
        created_at: epoch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use axum::response::IntoResponse;
    use chrono::Utc;

    use crate::{
        error::AppError,
        models::{
            quiz::{NewCategory, NewQuestion, NewQuiz, default_options},
            session::AttemptResponse,
            submission::SubmitTrigger,
        },
        services::attempt,
        store::{MemoryStore, QuizStore, SubmissionFilter},
    };

    struct LocalTransport {
        store: Arc<MemoryStore>,
        participant_id: i64,
        quiz_id: i64,
        offline: AtomicBool,
        saves: AtomicUsize,
    }

    fn rejected(err: AppError) -> ClientError {
        let message = err.to_string();
        ClientError::Rejected {
            status: err.into_response().status().as_u16(),
            message,
        }
    }

    #[async_trait]
    impl AttemptTransport for LocalTransport {
        async fn load(&self) -> Result<AttemptResponse, ClientError> {
            attempt::load_attempt(self.store.as_ref(), self.participant_id, self.quiz_id, Utc::now())
                .await
                .map_err(rejected)
        }

        async fn save_progress(&self, update: &SaveProgressRequest) -> Result<ProgressAck, ClientError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(ClientError::Transport("offline".to_string()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            attempt::save_progress(self.store.as_ref(), self.participant_id, self.quiz_id, update, Utc::now())
                .await
                .map_err(rejected)
        }

        async fn submit(&self, req: &SubmitRequest) -> Result<SubmissionResult, ClientError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(ClientError::Transport("offline".to_string()));
            }
            attempt::submit(self.store.as_ref(), self.participant_id, self.quiz_id, req, Utc::now())
                .await
                .map_err(rejected)
        }

        async fn report_violation(&self, req: &ViolationRequest) -> Result<SubmissionResult, ClientError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(ClientError::Transport("offline".to_string()));
            }
            attempt::report_violation(self.store.as_ref(), self.participant_id, self.quiz_id, req, Utc::now())
                .await
                .map_err(rejected)
        }
    }

    /// Three Yes/No/Maybe questions, all correct on "Yes".
    async fn transport(time_limit_secs: u32) -> LocalTransport {
        let store = Arc::new(MemoryStore::new());
        let question = || NewQuestion {
            prompt: "Q".to_string(),
            options: default_options(),
            correct_answer: Some("Yes".to_string()),
        };
        let quiz = store
            .create_quiz(
                NewQuiz {
                    title: "Ethics".to_string(),
                    time_limit_secs,
                    created_by: 1,
                    categories: vec![NewCategory {
                        name: "Honesty".to_string(),
                        questions: vec![question(), question(), question()],
                    }],
                },
                Utc::now(),
            )
            .await
            .unwrap();
        LocalTransport {
            store,
            participant_id: 3,
            quiz_id: quiz.id,
            offline: AtomicBool::new(false),
            saves: AtomicUsize::new(0),
        }
    }

    fn channel() -> AutosaveChannel {
        AutosaveChannel::new(Duration::from_secs(5), 2)
    }

    #[tokio::test]
    async fn test_monitor_armed_before_first_question() {
        let attempt = Attempt::start(transport(60).await, channel()).await.unwrap();
        assert_eq!(attempt.monitor_state(), MonitorState::Armed);
        assert_eq!(attempt.session().current_index, 0);
        assert!(attempt.current_question().is_some());
        // Correct answers never reach the client.
        assert!(attempt.quiz().questions().all(|q| q.correct_answer.is_none()));
    }

    #[tokio::test]
    async fn test_answer_saves_now_navigation_waits_for_debounce() {
        let mut attempt = Attempt::start(transport(60).await, channel()).await.unwrap();

        attempt.select_option("Yes").await.unwrap();
        assert_eq!(attempt.transport().saves.load(Ordering::SeqCst), 1);

        attempt.navigate(1).await.unwrap();
        assert_eq!(attempt.transport().saves.load(Ordering::SeqCst), 1);

        attempt.tick(Duration::from_secs(5)).await.unwrap();
        assert_eq!(attempt.transport().saves.load(Ordering::SeqCst), 2);

        let t = attempt.transport();
        let stored = t.store.get_session(t.participant_id, t.quiz_id).await.unwrap().unwrap();
        assert_eq!(stored.current_index, 1);
        assert_eq!(stored.time_left, 55);
    }

    #[tokio::test]
    async fn test_failed_saves_retry_and_degrade() {
        let mut attempt = Attempt::start(transport(60).await, channel()).await.unwrap();
        attempt.transport().offline.store(true, Ordering::SeqCst);

        attempt.select_option("No").await.unwrap();
        assert!(!attempt.is_degraded());
        attempt.navigate(1).await.unwrap();
        attempt.tick(Duration::from_secs(6)).await.unwrap();
        assert!(attempt.is_degraded());

        attempt.transport().offline.store(false, Ordering::SeqCst);
        attempt.select_option("Maybe").await.unwrap();
        assert!(!attempt.is_degraded());

        let t = attempt.transport();
        let stored = t.store.get_session(t.participant_id, t.quiz_id).await.unwrap().unwrap();
        assert_eq!(stored.answers.len(), 2);
    }

    #[tokio::test]
    async fn test_timer_expiry_submits_partial_answers() {
        let mut attempt = Attempt::start(transport(10).await, channel()).await.unwrap();
        attempt.select_option("Yes").await.unwrap();

        attempt.tick(Duration::from_millis(9_500)).await.unwrap();
        assert!(!attempt.is_completed());
        attempt.tick(Duration::from_millis(600)).await.unwrap();

        assert!(attempt.is_completed());
        let result = attempt.result().unwrap();
        assert_eq!(result.trigger, SubmitTrigger::TimerExpired);
        assert_eq!(result.score, 1.0);
        assert_eq!(attempt.monitor_state(), MonitorState::Disarmed);
    }

    #[tokio::test]
    async fn test_first_violation_submits_once() {
        let mut attempt = Attempt::start(transport(60).await, channel()).await.unwrap();
        attempt.select_option("Yes").await.unwrap();
        attempt.navigate(1).await.unwrap();
        attempt.select_option("Maybe").await.unwrap();

        let first = attempt.on_event(&ClientEvent::Copy).await.unwrap();
        let second = attempt.on_event(&ClientEvent::Paste).await.unwrap();
        assert_eq!(first, Some(ViolationKind::Clipboard));
        assert_eq!(second, None);

        let result = attempt.result().unwrap();
        assert_eq!(result.score, 1.5);
        assert_eq!(
            result.trigger,
            SubmitTrigger::IntegrityViolation {
                kind: ViolationKind::Clipboard
            }
        );
        let t = attempt.transport();
        let count = t.store.list_submissions(SubmissionFilter::quiz(t.quiz_id)).await.unwrap().len();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_failed_violation_report_is_retried_on_tick() {
        let mut attempt = Attempt::start(transport(60).await, channel()).await.unwrap();
        attempt.transport().offline.store(true, Ordering::SeqCst);

        assert!(attempt.on_event(&ClientEvent::WindowBlur).await.is_err());
        assert!(!attempt.is_completed());

        attempt.transport().offline.store(false, Ordering::SeqCst);
        attempt.tick(Duration::from_secs(1)).await.unwrap();
        assert!(attempt.is_completed());
        assert_eq!(
            attempt.result().unwrap().trigger,
            SubmitTrigger::IntegrityViolation {
                kind: ViolationKind::FocusLost
            }
        );
    }

    #[tokio::test]
    async fn test_undelivered_expiry_keeps_its_trigger() {
        let mut attempt = Attempt::start(transport(5).await, channel()).await.unwrap();
        attempt.select_option("Yes").await.unwrap();
        attempt.transport().offline.store(true, Ordering::SeqCst);

        assert!(attempt.tick(Duration::from_secs(5)).await.is_err());
        assert!(!attempt.is_completed());

        // A violation while the expiry is undelivered does not relabel it.
        assert!(attempt.on_event(&ClientEvent::Copy).await.is_err());
        attempt.transport().offline.store(false, Ordering::SeqCst);
        attempt.tick(Duration::from_secs(1)).await.unwrap();

        assert!(attempt.is_completed());
        let result = attempt.result().unwrap();
        assert_eq!(result.trigger, SubmitTrigger::TimerExpired);
        assert_eq!(result.score, 1.0);
    }

    #[tokio::test]
    async fn test_explicit_submit_guards() {
        let mut attempt = Attempt::start(transport(60).await, channel()).await.unwrap();
        attempt.select_option("Yes").await.unwrap();
        assert!(matches!(attempt.submit().await, Err(ClientError::NotOnLastQuestion)));

        attempt.navigate(2).await.unwrap();
        attempt.select_option("No").await.unwrap();
        assert!(matches!(
            attempt.submit().await,
            Err(ClientError::Engine(EngineError::IncompleteSubmission { answered: 2, total: 3 }))
        ));

        attempt.navigate(1).await.unwrap();
        attempt.select_option("Maybe").await.unwrap();
        attempt.navigate(2).await.unwrap();
        let result = attempt.submit().await.unwrap();
        assert_eq!(result.score, 1.5);
        assert_eq!(result.trigger, SubmitTrigger::Explicit);
        assert!(matches!(attempt.submit().await, Err(ClientError::Completed)));
    }

    #[tokio::test]
    async fn test_restart_after_completion_shows_result() {
        let mut attempt = Attempt::start(transport(60).await, channel()).await.unwrap();
        attempt.on_event(&ClientEvent::ContextMenu).await.unwrap();
        let Attempt { transport, .. } = attempt;

        let resumed = Attempt::start(transport, channel()).await.unwrap();
        assert!(resumed.is_completed());
        assert_eq!(resumed.monitor_state(), MonitorState::Disarmed);
        assert!(resumed.result().is_some());
    }
}
