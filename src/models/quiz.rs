// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Longest accepted time budget for a quiz (24 hours).
pub const MAX_TIME_LIMIT_SECS: u32 = 24 * 60 * 60;

/// Option set used when an author does not supply one.
pub fn default_options() -> Vec<String> {
    vec!["Yes".to_string(), "No".to_string(), "Maybe".to_string()]
}

/// A quiz definition. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    /// Full time budget of an attempt, in seconds.
    pub time_limit_secs: u32,
    pub created_by: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub name: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Question {
    /// Assigned from a global sequence at authoring time, never reused.
    pub id: i64,
    pub prompt: String,
    pub options: Vec<String>,
    /// The designated correct option, if the author set one.
    pub correct_answer: Option<String>,
}

impl Quiz {
    /// All questions in presentation order (categories flattened).
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.categories.iter().flat_map(|c| c.questions.iter())
    }

    pub fn question_count(&self) -> usize {
        self.categories.iter().map(|c| c.questions.len()).sum()
    }

    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions().nth(index)
    }

    pub fn find_question(&self, question_id: i64) -> Option<&Question> {
        self.questions().find(|q| q.id == question_id)
    }
}

impl Question {
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

/// Quiz as shown to a participant: no correct answers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicQuiz {
    pub id: i64,
    pub title: String,
    pub time_limit_secs: u32,
    pub categories: Vec<PublicCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicCategory {
    pub name: String,
    pub questions: Vec<PublicQuestion>,
}

/// DTO for sending a question to the client (excludes the answer).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicQuestion {
    pub id: i64,
    pub prompt: String,
    pub options: Vec<String>,
}

impl From<&Quiz> for PublicQuiz {
    fn from(quiz: &Quiz) -> Self {
        PublicQuiz {
            id: quiz.id,
            title: quiz.title.clone(),
            time_limit_secs: quiz.time_limit_secs,
            categories: quiz
                .categories
                .iter()
                .map(|c| PublicCategory {
                    name: c.name.clone(),
                    questions: c
                        .questions
                        .iter()
                        .map(|q| PublicQuestion {
                            id: q.id,
                            prompt: q.prompt.clone(),
                            options: q.options.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Rebuilds a quiz tree on the client side. Correct answers stay unknown,
/// which is all the session state machine needs.
impl From<PublicQuiz> for Quiz {
    fn from(public: PublicQuiz) -> Self {
        Quiz {
            id: public.id,
            title: public.title,
            time_limit_secs: public.time_limit_secs,
            created_by: 0,
            created_at: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
            categories: public
                .categories
                .into_iter()
                .map(|c| Category {
                    name: c.name,
                    questions: c
                        .questions
                        .into_iter()
                        .map(|q| Question {
                            id: q.id,
                            prompt: q.prompt,
                            options: q.options,
                            correct_answer: None,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Short listing entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct QuizSummary {
    pub id: i64,
    pub title: String,
    pub time_limit_secs: i32,
    pub question_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new quiz.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters."))]
    pub title: String,
    #[validate(range(min = 1, max = 86400, message = "Time limit must be between 1 second and 24 hours."))]
    pub time_limit_secs: Option<u32>,
    #[validate(length(min = 1, message = "At least one category with questions is required."), nested)]
    pub categories: Vec<CreateCategoryRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, message = "Each category needs at least one question."), nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = validate_correct_answer))]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub prompt: String,
    #[serde(default = "default_options")]
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
}

fn validate_options(options: &[String]) -> Result<(), ValidationError> {
    if options.is_empty() {
        return Err(ValidationError::new("options_cannot_be_empty"));
    }
    for (i, opt) in options.iter().enumerate() {
        if opt.trim().is_empty() {
            return Err(ValidationError::new("option_cannot_be_blank"));
        }
        if opt.len() > 100 {
            return Err(ValidationError::new("option_too_long"));
        }
        if options[..i].contains(opt) {
            return Err(ValidationError::new("duplicate_option"));
        }
    }
    Ok(())
}

fn validate_correct_answer(question: &CreateQuestionRequest) -> Result<(), ValidationError> {
    match &question.correct_answer {
        Some(answer) if !question.options.contains(answer) => {
            Err(ValidationError::new("correct_answer_not_in_options"))
        }
        _ => Ok(()),
    }
}

/// Validated quiz content handed to the store, which assigns identifiers.
#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub time_limit_secs: u32,
    pub created_by: i64,
    pub categories: Vec<NewCategory>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(options: Vec<&str>, correct: Option<&str>) -> CreateQuestionRequest {
        CreateQuestionRequest {
            prompt: "Is it?".to_string(),
            options: options.into_iter().map(String::from).collect(),
            correct_answer: correct.map(String::from),
        }
    }

    #[test]
    fn test_question_defaults_to_yes_no_maybe() {
        let q: CreateQuestionRequest = serde_json::from_str(r#"{"prompt": "Fair?"}"#).unwrap();
        assert_eq!(q.options, vec!["Yes", "No", "Maybe"]);
        assert!(q.validate().is_ok());
    }

    #[test]
    fn test_correct_answer_must_be_an_option() {
        assert!(question(vec!["Yes", "No"], Some("Yes")).validate().is_ok());
        assert!(question(vec!["Yes", "No"], Some("Maybe")).validate().is_err());
    }

    #[test]
    fn test_duplicate_options_rejected() {
        assert!(question(vec!["Yes", "Yes"], None).validate().is_err());
        assert!(question(vec![], None).validate().is_err());
    }

    #[test]
    fn test_empty_category_list_rejected() {
        let req = CreateQuizRequest {
            title: "Ethics".to_string(),
            time_limit_secs: None,
            categories: vec![],
        };
        assert!(req.validate().is_err());

        let req = CreateQuizRequest {
            title: "Ethics".to_string(),
            time_limit_secs: Some(60),
            categories: vec![CreateCategoryRequest {
                name: "Ethics".to_string(),
                questions: vec![],
            }],
        };
        assert!(req.validate().is_err());
    }
}
