//! The per-attempt state machine: `NotStarted -> InProgress -> Completed`.

use chrono::{DateTime, Duration, Utc};

use crate::{
    engine::{EngineError, Ignored, Outcome},
    models::{
        quiz::Quiz,
        session::{Answer, SaveProgressRequest, Session, SessionStatus},
        submission::SubmitTrigger,
    },
};

impl Session {
    /// A fresh attempt: first question, no answers, the quiz's full time budget.
    pub fn start(id: i64, participant_id: i64, quiz: &Quiz, now: DateTime<Utc>) -> Self {
        Session {
            id,
            participant_id,
            quiz_id: quiz.id,
            current_index: 0,
            answers: Vec::new(),
            time_left: quiz.time_limit_secs,
            clock_at: now,
            completed: false,
            version: 0,
            created_at: now,
        }
    }

    pub fn status(&self) -> SessionStatus {
        if self.completed {
            SessionStatus::Completed
        } else {
            SessionStatus::InProgress
        }
    }

    pub fn is_expired(&self) -> bool {
        self.time_left == 0
    }

    pub fn answer_for(&self, question_id: i64) -> Option<&str> {
        self.answers
            .iter()
            .find(|a| a.question_id == question_id)
            .map(|a| a.selected_option.as_str())
    }

    /// Number of the quiz's questions that have an answer.
    pub fn answered_count(&self, quiz: &Quiz) -> usize {
        quiz.questions()
            .filter(|q| self.answer_for(q.id).is_some())
            .count()
    }

    /// Records `option` for the question at `question_index`, replacing any
    /// earlier choice for that question.
    pub fn select_option(
        &mut self,
        quiz: &Quiz,
        question_index: usize,
        option: &str,
    ) -> Result<Outcome, EngineError> {
        if self.completed {
            return Ok(Outcome::Ignored(Ignored::SessionClosed));
        }
        let question = quiz
            .question_at(question_index)
            .ok_or(EngineError::IndexOutOfRange {
                index: question_index,
                len: quiz.question_count(),
            })?;
        if !question.has_option(option) {
            return Err(EngineError::InvalidOption {
                question_id: question.id,
                option: option.to_string(),
            });
        }
        upsert(&mut self.answers, question.id, option);
        Ok(Outcome::Applied)
    }

    pub fn navigate(&mut self, quiz: &Quiz, target_index: usize) -> Result<Outcome, EngineError> {
        if self.completed {
            return Ok(Outcome::Ignored(Ignored::SessionClosed));
        }
        check_index(quiz, target_index)?;
        self.current_index = target_index;
        Ok(Outcome::Applied)
    }

    /// Charges the whole seconds elapsed since `clock_at` against the budget.
    ///
    /// The anchor moves by exactly the charged seconds so sub-second remainders
    /// carry over to the next tick instead of being lost.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Outcome {
        if self.completed {
            return Outcome::Ignored(Ignored::SessionClosed);
        }
        let elapsed = (now - self.clock_at).num_seconds();
        if elapsed > 0 {
            self.clock_at += Duration::seconds(elapsed);
            let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
            self.time_left = self.time_left.saturating_sub(elapsed);
        }
        Outcome::Applied
    }

    /// Client-side countdown driven by a local timer.
    pub fn count_down(&mut self, seconds: u32) -> Outcome {
        if self.completed {
            return Outcome::Ignored(Ignored::SessionClosed);
        }
        self.time_left = self.time_left.saturating_sub(seconds);
        Outcome::Applied
    }

    /// Server side of the autosave contract.
    ///
    /// Payloads are validated before anything else. A payload claiming more
    /// time than is stored is dropped whole. Otherwise the server clock is
    /// charged first and the lower of the two remaining times wins.
    pub fn apply_progress(
        &mut self,
        quiz: &Quiz,
        update: &SaveProgressRequest,
        now: DateTime<Utc>,
    ) -> Result<Outcome, EngineError> {
        if self.completed {
            return Ok(Outcome::Ignored(Ignored::SessionClosed));
        }
        check_index(quiz, update.current_index)?;
        validate_answers(quiz, &update.answers)?;

        if update.time_left > self.time_left {
            return Ok(Outcome::Ignored(Ignored::StaleProgress));
        }

        self.tick(now);
        self.time_left = self.time_left.min(update.time_left);
        for answer in &update.answers {
            upsert(&mut self.answers, answer.question_id, &answer.selected_option);
        }
        self.current_index = update.current_index;
        Ok(Outcome::Applied)
    }

    /// Upserts a batch of answers; all or nothing.
    pub fn merge_answers(&mut self, quiz: &Quiz, answers: &[Answer]) -> Result<Outcome, EngineError> {
        if self.completed {
            return Ok(Outcome::Ignored(Ignored::SessionClosed));
        }
        validate_answers(quiz, answers)?;
        for answer in answers {
            upsert(&mut self.answers, answer.question_id, &answer.selected_option);
        }
        Ok(Outcome::Applied)
    }

    /// Upserts the valid entries of `answers` and returns the ones it had to
    /// drop. Used on forced submission, which must not fail on bad input.
    pub fn merge_valid_answers(&mut self, quiz: &Quiz, answers: &[Answer]) -> Vec<EngineError> {
        if self.completed {
            return Vec::new();
        }
        let mut dropped = Vec::new();
        for answer in answers {
            match validate_answers(quiz, std::slice::from_ref(answer)) {
                Ok(()) => upsert(&mut self.answers, answer.question_id, &answer.selected_option),
                Err(e) => dropped.push(e),
            }
        }
        dropped
    }

    /// `InProgress -> Completed`.
    ///
    /// Returns the frozen answers in quiz question order, or `None` if the
    /// session had already been completed. Explicit submissions must cover
    /// every question; forced ones never fail.
    pub fn finalize(
        &mut self,
        quiz: &Quiz,
        trigger: SubmitTrigger,
    ) -> Result<Option<Vec<Answer>>, EngineError> {
        if self.completed {
            return Ok(None);
        }
        if !trigger.is_forced() {
            let answered = self.answered_count(quiz);
            let total = quiz.question_count();
            if answered < total {
                return Err(EngineError::IncompleteSubmission { answered, total });
            }
        }
        let frozen = quiz
            .questions()
            .filter_map(|q| {
                self.answer_for(q.id).map(|option| Answer {
                    question_id: q.id,
                    selected_option: option.to_string(),
                })
            })
            .collect();
        self.completed = true;
        Ok(Some(frozen))
    }
}

fn check_index(quiz: &Quiz, index: usize) -> Result<(), EngineError> {
    let len = quiz.question_count();
    if index >= len {
        return Err(EngineError::IndexOutOfRange { index, len });
    }
    Ok(())
}

fn validate_answers(quiz: &Quiz, answers: &[Answer]) -> Result<(), EngineError> {
    for answer in answers {
        let question = quiz
            .find_question(answer.question_id)
            .ok_or(EngineError::UnknownQuestion(answer.question_id))?;
        if !question.has_option(&answer.selected_option) {
            return Err(EngineError::InvalidOption {
                question_id: question.id,
                option: answer.selected_option.clone(),
            });
        }
    }
    Ok(())
}

fn upsert(answers: &mut Vec<Answer>, question_id: i64, option: &str) {
    match answers.iter_mut().find(|a| a.question_id == question_id) {
        Some(existing) => existing.selected_option = option.to_string(),
        None => answers.push(Answer {
            question_id,
            selected_option: option.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{integrity::ViolationKind, test_support::quiz_with};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn answer(question_id: i64, option: &str) -> Answer {
        Answer {
            question_id,
            selected_option: option.to_string(),
        }
    }

    fn progress(index: usize, answers: Vec<Answer>, time_left: u32) -> SaveProgressRequest {
        SaveProgressRequest {
            current_index: index,
            answers,
            time_left,
        }
    }

    #[test]
    fn test_start_uses_defaults() {
        let quiz = quiz_with(&[("Ethics", 2)], 900);
        let s = Session::start(1, 7, &quiz, t0());
        assert_eq!(s.current_index, 0);
        assert!(s.answers.is_empty());
        assert_eq!(s.time_left, 900);
        assert_eq!(s.status(), SessionStatus::InProgress);
    }

    #[test]
    fn test_reanswer_overwrites() {
        let quiz = quiz_with(&[("Ethics", 2)], 900);
        let mut s = Session::start(1, 7, &quiz, t0());
        s.select_option(&quiz, 0, "Yes").unwrap();
        s.select_option(&quiz, 0, "No").unwrap();
        assert_eq!(s.answers, vec![answer(1, "No")]);
    }

    #[test]
    fn test_select_rejects_unknown_option_and_index() {
        let quiz = quiz_with(&[("Ethics", 2)], 900);
        let mut s = Session::start(1, 7, &quiz, t0());
        assert!(matches!(
            s.select_option(&quiz, 0, "Perhaps"),
            Err(EngineError::InvalidOption { .. })
        ));
        assert!(matches!(
            s.select_option(&quiz, 2, "Yes"),
            Err(EngineError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(s.answers.is_empty());
    }

    #[test]
    fn test_navigate_is_bounds_checked() {
        let quiz = quiz_with(&[("Ethics", 3)], 900);
        let mut s = Session::start(1, 7, &quiz, t0());
        assert_eq!(s.navigate(&quiz, 2), Ok(Outcome::Applied));
        assert_eq!(s.current_index, 2);
        assert!(s.navigate(&quiz, 3).is_err());
        assert_eq!(s.current_index, 2);
        assert_eq!(s.time_left, 900);
    }

    #[test]
    fn test_tick_carries_subsecond_remainder() {
        let quiz = quiz_with(&[("Ethics", 1)], 60);
        let mut s = Session::start(1, 7, &quiz, t0());
        s.tick(t0() + Duration::milliseconds(1500));
        assert_eq!(s.time_left, 59);
        s.tick(t0() + Duration::milliseconds(2100));
        assert_eq!(s.time_left, 58);
        s.tick(t0() + Duration::seconds(600));
        assert_eq!(s.time_left, 0);
        assert!(s.is_expired());
    }

    #[test]
    fn test_tick_ignores_clock_going_backwards() {
        let quiz = quiz_with(&[("Ethics", 1)], 60);
        let mut s = Session::start(1, 7, &quiz, t0());
        s.tick(t0() - Duration::seconds(30));
        assert_eq!(s.time_left, 60);
        assert_eq!(s.clock_at, t0());
    }

    #[test]
    fn test_stale_progress_is_dropped() {
        let quiz = quiz_with(&[("Ethics", 2)], 45);
        let mut s = Session::start(1, 7, &quiz, t0());
        let before = s.clone();

        let outcome = s
            .apply_progress(&quiz, &progress(1, vec![answer(1, "Yes")], 50), t0())
            .unwrap();

        assert_eq!(outcome, Outcome::Ignored(Ignored::StaleProgress));
        assert_eq!(s, before);
        assert_eq!(s.time_left, 45);
    }

    #[test]
    fn test_progress_converges_with_non_increasing_time() {
        let quiz = quiz_with(&[("Ethics", 3)], 100);
        let mut s = Session::start(1, 7, &quiz, t0());
        let payloads = [
            progress(0, vec![answer(1, "Yes")], 90),
            progress(1, vec![answer(1, "Yes"), answer(2, "No")], 80),
            progress(2, vec![answer(2, "Maybe"), answer(3, "Yes")], 80),
        ];
        for p in &payloads {
            assert_eq!(s.apply_progress(&quiz, p, t0()), Ok(Outcome::Applied));
        }
        let converged = s.clone();

        // Replaying the last payload changes nothing.
        s.apply_progress(&quiz, &payloads[2], t0()).unwrap();
        assert_eq!(s, converged);

        // An older payload is stale and cannot roll anything back.
        let outcome = s.apply_progress(&quiz, &payloads[0], t0()).unwrap();
        assert_eq!(outcome, Outcome::Ignored(Ignored::StaleProgress));
        assert_eq!(s, converged);

        assert_eq!(s.current_index, 2);
        assert_eq!(s.time_left, 80);
        assert_eq!(s.answer_for(2), Some("Maybe"));
        assert_eq!(s.answers.len(), 3);
    }

    #[test]
    fn test_server_clock_wins_when_lower() {
        let quiz = quiz_with(&[("Ethics", 1)], 100);
        let mut s = Session::start(1, 7, &quiz, t0());
        s.apply_progress(&quiz, &progress(0, vec![], 99), t0() + Duration::seconds(30))
            .unwrap();
        assert_eq!(s.time_left, 70);
    }

    #[test]
    fn test_invalid_progress_leaves_state_unchanged() {
        let quiz = quiz_with(&[("Ethics", 2)], 100);
        let mut s = Session::start(1, 7, &quiz, t0());
        let before = s.clone();
        let bad = progress(0, vec![answer(1, "Yes"), answer(99, "Yes")], 90);
        assert_eq!(
            s.apply_progress(&quiz, &bad, t0()),
            Err(EngineError::UnknownQuestion(99))
        );
        assert_eq!(s, before);
    }

    #[test]
    fn test_explicit_finalize_requires_every_answer() {
        let quiz = quiz_with(&[("Ethics", 2)], 100);
        let mut s = Session::start(1, 7, &quiz, t0());
        s.select_option(&quiz, 0, "Yes").unwrap();
        assert_eq!(
            s.finalize(&quiz, SubmitTrigger::Explicit),
            Err(EngineError::IncompleteSubmission { answered: 1, total: 2 })
        );
        assert!(!s.completed);

        s.select_option(&quiz, 1, "No").unwrap();
        let frozen = s.finalize(&quiz, SubmitTrigger::Explicit).unwrap().unwrap();
        assert_eq!(frozen, vec![answer(1, "Yes"), answer(2, "No")]);
        assert!(s.completed);
    }

    #[test]
    fn test_forced_finalize_accepts_partial_answers() {
        let quiz = quiz_with(&[("A", 3), ("B", 2)], 100);
        let mut s = Session::start(1, 7, &quiz, t0());
        s.select_option(&quiz, 4, "Yes").unwrap();
        s.select_option(&quiz, 0, "No").unwrap();
        let frozen = s.finalize(&quiz, SubmitTrigger::TimerExpired).unwrap().unwrap();
        // Frozen in quiz order, not answer order.
        assert_eq!(frozen, vec![answer(1, "No"), answer(5, "Yes")]);
    }

    #[test]
    fn test_merge_valid_answers_drops_bad_entries() {
        let quiz = quiz_with(&[("Ethics", 2)], 100);
        let mut s = Session::start(1, 7, &quiz, t0());
        let dropped = s.merge_valid_answers(
            &quiz,
            &[answer(1, "Yes"), answer(2, "Perhaps"), answer(99, "No")],
        );
        assert_eq!(s.answers, vec![answer(1, "Yes")]);
        assert_eq!(
            dropped,
            vec![
                EngineError::InvalidOption {
                    question_id: 2,
                    option: "Perhaps".to_string()
                },
                EngineError::UnknownQuestion(99),
            ]
        );
    }

    #[test]
    fn test_completed_session_ignores_everything() {
        let quiz = quiz_with(&[("Ethics", 2)], 100);
        let mut s = Session::start(1, 7, &quiz, t0());
        let trigger = SubmitTrigger::IntegrityViolation {
            kind: ViolationKind::VisibilityLost,
        };
        assert!(s.finalize(&quiz, trigger).unwrap().is_some());
        let frozen = s.clone();

        let closed = Outcome::Ignored(Ignored::SessionClosed);
        assert_eq!(s.select_option(&quiz, 0, "Yes"), Ok(closed));
        assert_eq!(s.navigate(&quiz, 1), Ok(closed));
        assert_eq!(s.tick(t0() + Duration::seconds(50)), closed);
        assert_eq!(s.count_down(10), closed);
        assert_eq!(s.apply_progress(&quiz, &progress(1, vec![], 10), t0()), Ok(closed));
        assert_eq!(s.finalize(&quiz, SubmitTrigger::TimerExpired), Ok(None));
        assert_eq!(s, frozen);
    }
}
