// src/docs.rs

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{
    engine::integrity::{ClientEvent, KeyCombo, ViolationKind},
    handlers::{quiz, report, session},
    models::{
        quiz::{
            Category, CreateCategoryRequest, CreateQuestionRequest, CreateQuizRequest, PublicCategory,
            PublicQuestion, PublicQuiz, Question, Quiz, QuizSummary,
        },
        report::{CategoryDistribution, DistributionReport, OptionShare},
        session::{
            AckStatus, Answer, AttemptResponse, ProgressAck, SaveProgressRequest, SessionStatus, SessionView,
            SubmitReason, SubmitRequest, ViolationRequest,
        },
        submission::{LeaderboardEntry, ScoredAnswer, Submission, SubmissionResult, SubmitTrigger},
    },
};

/// OpenAPI document, served as JSON at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        quiz::create_quiz,
        quiz::list_quizzes,
        quiz::get_quiz,
        quiz::load_attempt,
        session::save_progress,
        session::submit,
        session::report_violation,
        report::quiz_submissions,
        report::distribution,
        report::leaderboard,
        report::participant_submissions,
        report::my_submissions,
        report::submission_result,
    ),
    components(schemas(
        Quiz, Category, Question, QuizSummary,
        PublicQuiz, PublicCategory, PublicQuestion,
        CreateQuizRequest, CreateCategoryRequest, CreateQuestionRequest,
        Answer, SessionStatus, SessionView, AttemptResponse,
        SaveProgressRequest, AckStatus, ProgressAck,
        SubmitReason, SubmitRequest, ViolationRequest,
        ClientEvent, KeyCombo, ViolationKind,
        SubmitTrigger, Submission, ScoredAnswer, SubmissionResult, LeaderboardEntry,
        OptionShare, CategoryDistribution, DistributionReport,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "quizzes", description = "Quiz authoring and listing"),
        (name = "attempts", description = "Taking a quiz"),
        (name = "reports", description = "Results and distributions")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
