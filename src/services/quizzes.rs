// src/services/quizzes.rs

use chrono::{DateTime, Utc};
use validator::Validate;

use crate::{
    error::AppError,
    models::quiz::{CreateQuizRequest, NewCategory, NewQuestion, NewQuiz, Quiz, QuizSummary},
    store::QuizStore,
    utils::html::clean_html,
};

/// Fetches a quiz or fails with 404.
pub async fn require_quiz(store: &dyn QuizStore, quiz_id: i64) -> Result<Quiz, AppError> {
    store
        .get_quiz(quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", quiz_id)))
}

/// Validates and stores a new quiz.
///
/// * Author text is sanitized before storage.
/// * `default_time_limit_secs` applies when the request has no limit.
pub async fn create_quiz(
    store: &dyn QuizStore,
    req: CreateQuizRequest,
    created_by: i64,
    default_time_limit_secs: u32,
    now: DateTime<Utc>,
) -> Result<Quiz, AppError> {
    req.validate()?;

    let title = sanitized(&req.title, "Title")?;
    let categories = req
        .categories
        .into_iter()
        .map(|c| {
            let questions = c
                .questions
                .into_iter()
                .map(|q| {
                    Ok(NewQuestion {
                        prompt: sanitized(&q.prompt, "Question prompt")?,
                        options: q.options,
                        correct_answer: q.correct_answer,
                    })
                })
                .collect::<Result<Vec<_>, AppError>>()?;
            Ok(NewCategory {
                name: sanitized(&c.name, "Category name")?,
                questions,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let quiz = store
        .create_quiz(
            NewQuiz {
                title,
                time_limit_secs: req.time_limit_secs.unwrap_or(default_time_limit_secs),
                created_by,
                categories,
            },
            now,
        )
        .await?;

    tracing::info!(
        quiz_id = quiz.id,
        questions = quiz.question_count(),
        "Quiz created by {}",
        created_by
    );
    Ok(quiz)
}

pub async fn list_quizzes(store: &dyn QuizStore) -> Result<Vec<QuizSummary>, AppError> {
    store.list_quizzes().await
}

/// Sanitized text must still say something.
fn sanitized(input: &str, field: &str) -> Result<String, AppError> {
    let cleaned = clean_html(input);
    if cleaned.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} is empty after sanitization", field)));
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::{CreateCategoryRequest, CreateQuestionRequest, default_options};
    use crate::store::MemoryStore;

    fn request(prompt: &str, time_limit_secs: Option<u32>) -> CreateQuizRequest {
        CreateQuizRequest {
            title: "Workplace ethics".to_string(),
            time_limit_secs,
            categories: vec![CreateCategoryRequest {
                name: "Honesty".to_string(),
                questions: vec![CreateQuestionRequest {
                    prompt: prompt.to_string(),
                    options: default_options(),
                    correct_answer: Some("No".to_string()),
                }],
            }],
        }
    }

    #[tokio::test]
    async fn test_create_sanitizes_and_defaults_time_limit() {
        let store = MemoryStore::new();
        let quiz = create_quiz(
            &store,
            request("Take <b>credit</b>?<script>x()</script>", None),
            7,
            900,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(quiz.time_limit_secs, 900);
        assert_eq!(quiz.created_by, 7);
        assert_eq!(quiz.categories[0].questions[0].prompt, "Take <b>credit</b>?");
        assert_eq!(require_quiz(&store, quiz.id).await.unwrap().title, quiz.title);
    }

    #[tokio::test]
    async fn test_prompt_that_sanitizes_to_nothing_is_rejected() {
        let store = MemoryStore::new();
        let err = create_quiz(&store, request("<script>x()</script>", Some(60)), 7, 900, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(store.list_quizzes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_time_limit_is_rejected() {
        let store = MemoryStore::new();
        let err = create_quiz(&store, request("Fair?", Some(0)), 7, 900, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_quiz_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(require_quiz(&store, 42).await, Err(AppError::NotFound(_))));
    }
}
