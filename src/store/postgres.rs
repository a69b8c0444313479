use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};

use crate::{
    error::AppError,
    models::{
        quiz::{Category, NewQuiz, Question, Quiz, QuizSummary},
        session::{Answer, Session},
        submission::{NewSubmission, Submission, SubmitTrigger},
    },
    store::{QuizStore, SubmissionFilter},
};

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct QuizRow {
    id: i64,
    title: String,
    time_limit_secs: i32,
    created_by: i64,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    category_id: i64,
    prompt: String,
    options: Json<Vec<String>>,
    correct_answer: Option<String>,
}

#[derive(FromRow)]
struct SessionRow {
    id: i64,
    participant_id: i64,
    quiz_id: i64,
    current_index: i32,
    answers: Json<Vec<Answer>>,
    time_left: i32,
    clock_at: DateTime<Utc>,
    completed: bool,
    version: i64,
    created_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            participant_id: row.participant_id,
            quiz_id: row.quiz_id,
            current_index: row.current_index.max(0) as usize,
            answers: row.answers.0,
            time_left: row.time_left.max(0) as u32,
            clock_at: row.clock_at,
            completed: row.completed,
            version: row.version,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct SubmissionRow {
    id: i64,
    session_id: i64,
    participant_id: i64,
    quiz_id: i64,
    answers: Json<Vec<Answer>>,
    submit_trigger: String,
    violation: Option<String>,
    submitted_at: DateTime<Utc>,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = AppError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        let trigger = SubmitTrigger::from_columns(&row.submit_trigger, row.violation.as_deref())
            .ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "Submission {} has unknown trigger '{}'",
                    row.id, row.submit_trigger
                ))
            })?;
        Ok(Submission {
            id: row.id,
            session_id: row.session_id,
            participant_id: row.participant_id,
            quiz_id: row.quiz_id,
            answers: row.answers.0,
            trigger,
            submitted_at: row.submitted_at,
        })
    }
}

const SESSION_COLUMNS: &str = "id, participant_id, quiz_id, current_index, answers, time_left, \
                               clock_at, completed, version, created_at";

const SUBMISSION_COLUMNS: &str = "id, session_id, participant_id, quiz_id, answers, submit_trigger, \
                                  violation, submitted_at";

fn into_submissions(rows: Vec<SubmissionRow>) -> Result<Vec<Submission>, AppError> {
    rows.into_iter().map(Submission::try_from).collect()
}

#[async_trait]
impl QuizStore for PgStore {
    async fn create_quiz(&self, quiz: NewQuiz, now: DateTime<Utc>) -> Result<Quiz, AppError> {
        let mut tx = self.pool.begin().await?;

        let quiz_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO quizzes (title, time_limit_secs, created_by, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&quiz.title)
        .bind(quiz.time_limit_secs as i32)
        .bind(quiz.created_by)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert quiz: {:?}", e);
            AppError::from(e)
        })?;

        let mut categories = Vec::with_capacity(quiz.categories.len());
        for (position, category) in quiz.categories.into_iter().enumerate() {
            let category_id: i64 = sqlx::query_scalar(
                "INSERT INTO quiz_categories (quiz_id, position, name) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(quiz_id)
            .bind(position as i32)
            .bind(&category.name)
            .fetch_one(&mut *tx)
            .await?;

            let mut questions = Vec::with_capacity(category.questions.len());
            for (position, question) in category.questions.into_iter().enumerate() {
                let question_id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO questions (category_id, position, prompt, options, correct_answer)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id
                    "#,
                )
                .bind(category_id)
                .bind(position as i32)
                .bind(&question.prompt)
                .bind(Json(&question.options))
                .bind(&question.correct_answer)
                .fetch_one(&mut *tx)
                .await?;

                questions.push(Question {
                    id: question_id,
                    prompt: question.prompt,
                    options: question.options,
                    correct_answer: question.correct_answer,
                });
            }
            categories.push(Category {
                name: category.name,
                questions,
            });
        }

        tx.commit().await?;

        Ok(Quiz {
            id: quiz_id,
            title: quiz.title,
            time_limit_secs: quiz.time_limit_secs,
            created_by: quiz.created_by,
            created_at: now,
            categories,
        })
    }

    async fn get_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError> {
        let Some(row) = sqlx::query_as::<_, QuizRow>(
            "SELECT id, title, time_limit_secs, created_by, created_at FROM quizzes WHERE id = $1",
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let category_rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name FROM quiz_categories WHERE quiz_id = $1 ORDER BY position",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let question_rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT q.id, q.category_id, q.prompt, q.options, q.correct_answer
            FROM questions q
            JOIN quiz_categories c ON q.category_id = c.id
            WHERE c.quiz_id = $1
            ORDER BY c.position, q.position
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let categories = category_rows
            .into_iter()
            .map(|c| Category {
                name: c.name,
                questions: question_rows
                    .iter()
                    .filter(|q| q.category_id == c.id)
                    .map(|q| Question {
                        id: q.id,
                        prompt: q.prompt.clone(),
                        options: q.options.0.clone(),
                        correct_answer: q.correct_answer.clone(),
                    })
                    .collect(),
            })
            .collect();

        Ok(Some(Quiz {
            id: row.id,
            title: row.title,
            time_limit_secs: row.time_limit_secs.max(0) as u32,
            created_by: row.created_by,
            created_at: row.created_at,
            categories,
        }))
    }

    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, AppError> {
        let quizzes = sqlx::query_as::<_, QuizSummary>(
            r#"
            SELECT
                z.id, z.title, z.time_limit_secs,
                COUNT(q.id) AS question_count,
                z.created_at
            FROM quizzes z
            LEFT JOIN quiz_categories c ON c.quiz_id = z.id
            LEFT JOIN questions q ON q.category_id = c.id
            GROUP BY z.id
            ORDER BY z.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list quizzes: {:?}", e);
            AppError::from(e)
        })?;

        Ok(quizzes)
    }

    async fn load_or_create_session(
        &self,
        participant_id: i64,
        quiz: &Quiz,
        now: DateTime<Utc>,
    ) -> Result<Session, AppError> {
        // Atomic upsert: a concurrent first load loses the insert and reads
        // the winner's row.
        sqlx::query(
            r#"
            INSERT INTO quiz_sessions (participant_id, quiz_id, time_left, clock_at, created_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (participant_id, quiz_id) DO NOTHING
            "#,
        )
        .bind(participant_id)
        .bind(quiz.id)
        .bind(quiz.time_limit_secs as i32)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_session(participant_id, quiz.id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Session vanished after upsert".to_string()))
    }

    async fn get_session(&self, participant_id: i64, quiz_id: i64) -> Result<Option<Session>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM quiz_sessions WHERE participant_id = $1 AND quiz_id = $2",
            SESSION_COLUMNS
        ))
        .bind(participant_id)
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Session::from))
    }

    async fn save_session(&self, session: &Session) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE quiz_sessions
            SET current_index = $1, answers = $2, time_left = $3, clock_at = $4,
                version = version + 1
            WHERE id = $5 AND version = $6 AND completed = FALSE
            "#,
        )
        .bind(session.current_index as i32)
        .bind(Json(&session.answers))
        .bind(session.time_left as i32)
        .bind(session.clock_at)
        .bind(session.id)
        .bind(session.version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete_session(
        &self,
        session: &Session,
        submission: NewSubmission,
    ) -> Result<Option<Submission>, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE quiz_sessions
            SET current_index = $1, answers = $2, time_left = $3, clock_at = $4,
                completed = TRUE, version = version + 1
            WHERE id = $5 AND version = $6 AND completed = FALSE
            "#,
        )
        .bind(session.current_index as i32)
        .bind(Json(&session.answers))
        .bind(session.time_left as i32)
        .bind(session.clock_at)
        .bind(session.id)
        .bind(session.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(None);
        }

        let (trigger, violation) = submission.trigger.to_columns();
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            r#"
            INSERT INTO submissions
                (session_id, participant_id, quiz_id, answers, submit_trigger, violation, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            SUBMISSION_COLUMNS
        ))
        .bind(submission.session_id)
        .bind(submission.participant_id)
        .bind(submission.quiz_id)
        .bind(Json(&submission.answers))
        .bind(trigger)
        .bind(violation)
        .bind(submission.submitted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert submission: {:?}", e);
            AppError::from(e)
        })?;

        tx.commit().await?;

        Submission::try_from(row).map(Some)
    }

    async fn submission_for_session(&self, session_id: i64) -> Result<Option<Submission>, AppError> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {} FROM submissions WHERE session_id = $1",
            SUBMISSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Submission::try_from).transpose()
    }

    async fn get_submission(&self, submission_id: i64) -> Result<Option<Submission>, AppError> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {} FROM submissions WHERE id = $1",
            SUBMISSION_COLUMNS
        ))
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Submission::try_from).transpose()
    }

    async fn list_submissions(&self, filter: SubmissionFilter) -> Result<Vec<Submission>, AppError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
            r#"
            SELECT {} FROM submissions
            WHERE ($1::BIGINT IS NULL OR quiz_id = $1)
              AND ($2::BIGINT IS NULL OR participant_id = $2)
            ORDER BY submitted_at, id
            "#,
            SUBMISSION_COLUMNS
        ))
        .bind(filter.quiz_id)
        .bind(filter.participant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch submissions: {:?}", e);
            AppError::from(e)
        })?;

        into_submissions(rows)
    }
}
