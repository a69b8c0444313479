use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    error::AppError,
    models::{
        quiz::{Category, NewQuiz, Question, Quiz, QuizSummary},
        session::Session,
        submission::{NewSubmission, Submission},
    },
    store::{QuizStore, SubmissionFilter},
};

#[derive(Default)]
struct Inner {
    quizzes: HashMap<i64, Quiz>,
    sessions: HashMap<(i64, i64), Session>,
    submissions: Vec<Submission>,
    next_quiz_id: i64,
    next_question_id: i64,
    next_session_id: i64,
    next_submission_id: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// Process-local store. Every operation runs under one lock held only for the
/// duration of a map lookup, so the compare-and-swap contract holds exactly.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn create_quiz(&self, quiz: NewQuiz, now: DateTime<Utc>) -> Result<Quiz, AppError> {
        let mut inner = self.inner.write().await;
        let id = next(&mut inner.next_quiz_id);
        let categories = quiz
            .categories
            .into_iter()
            .map(|c| Category {
                name: c.name,
                questions: c
                    .questions
                    .into_iter()
                    .map(|q| Question {
                        id: next(&mut inner.next_question_id),
                        prompt: q.prompt,
                        options: q.options,
                        correct_answer: q.correct_answer,
                    })
                    .collect(),
            })
            .collect();
        let stored = Quiz {
            id,
            title: quiz.title,
            time_limit_secs: quiz.time_limit_secs,
            created_by: quiz.created_by,
            created_at: now,
            categories,
        };
        inner.quizzes.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError> {
        Ok(self.inner.read().await.quizzes.get(&quiz_id).cloned())
    }

    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, AppError> {
        let inner = self.inner.read().await;
        let mut summaries: Vec<QuizSummary> = inner
            .quizzes
            .values()
            .map(|q| QuizSummary {
                id: q.id,
                title: q.title.clone(),
                time_limit_secs: q.time_limit_secs as i32,
                question_count: q.question_count() as i64,
                created_at: q.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(summaries)
    }

    async fn load_or_create_session(
        &self,
        participant_id: i64,
        quiz: &Quiz,
        now: DateTime<Utc>,
    ) -> Result<Session, AppError> {
        let mut inner = self.inner.write().await;
        let key = (participant_id, quiz.id);
        if let Some(existing) = inner.sessions.get(&key) {
            return Ok(existing.clone());
        }
        let id = next(&mut inner.next_session_id);
        let session = Session::start(id, participant_id, quiz, now);
        inner.sessions.insert(key, session.clone());
        Ok(session)
    }

    async fn get_session(&self, participant_id: i64, quiz_id: i64) -> Result<Option<Session>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .sessions
            .get(&(participant_id, quiz_id))
            .cloned())
    }

    async fn save_session(&self, session: &Session) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let key = (session.participant_id, session.quiz_id);
        match inner.sessions.get_mut(&key) {
            Some(stored) if stored.version == session.version && !stored.completed => {
                *stored = Session {
                    version: session.version + 1,
                    completed: false,
                    ..session.clone()
                };
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(AppError::NotFound("Session not found".to_string())),
        }
    }

    async fn complete_session(
        &self,
        session: &Session,
        submission: NewSubmission,
    ) -> Result<Option<Submission>, AppError> {
        let mut inner = self.inner.write().await;
        let key = (session.participant_id, session.quiz_id);
        match inner.sessions.get(&key) {
            Some(stored) if stored.version == session.version && !stored.completed => {}
            Some(_) => return Ok(None),
            None => return Err(AppError::NotFound("Session not found".to_string())),
        }

        let id = next(&mut inner.next_submission_id);
        let stored = Submission {
            id,
            session_id: submission.session_id,
            participant_id: submission.participant_id,
            quiz_id: submission.quiz_id,
            answers: submission.answers,
            trigger: submission.trigger,
            submitted_at: submission.submitted_at,
        };
        inner.sessions.insert(
            key,
            Session {
                version: session.version + 1,
                completed: true,
                ..session.clone()
            },
        );
        inner.submissions.push(stored.clone());
        Ok(Some(stored))
    }

    async fn submission_for_session(&self, session_id: i64) -> Result<Option<Submission>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .submissions
            .iter()
            .find(|s| s.session_id == session_id)
            .cloned())
    }

    async fn get_submission(&self, submission_id: i64) -> Result<Option<Submission>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .submissions
            .iter()
            .find(|s| s.id == submission_id)
            .cloned())
    }

    async fn list_submissions(&self, filter: SubmissionFilter) -> Result<Vec<Submission>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .submissions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }
}
