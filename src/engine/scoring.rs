//! The one place answers turn into marks. Every result, replay and report
//! goes through [`score`].

use std::collections::HashMap;

use crate::models::{
    quiz::Quiz,
    session::Answer,
    submission::{ScoredAnswer, Submission, SubmissionResult},
};

/// Option that earns partial credit whatever the designated answer is.
pub const UNCERTAIN_OPTION: &str = "Maybe";
pub const FULL_MARK: f64 = 1.0;
pub const PARTIAL_MARK: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    /// Sum of awarded marks; a multiple of 0.5.
    pub total_score: f64,
    pub total_questions: usize,
    /// One entry per quiz question, in quiz order.
    pub answer_details: Vec<ScoredAnswer>,
}

/// Marks for a single selection.
///
/// The uncertain option is checked first, so it earns partial credit even on a
/// question whose designated answer is the uncertain option itself.
pub fn marks_for(selected: &str, correct: Option<&str>) -> f64 {
    if selected == UNCERTAIN_OPTION {
        PARTIAL_MARK
    } else if Some(selected) == correct {
        FULL_MARK
    } else {
        0.0
    }
}

/// Scores an answer set against a quiz. Pure: same inputs, same report.
///
/// Unanswered questions are reported with no selection and zero marks.
/// Answers to questions outside the quiz are ignored.
pub fn score(answers: &[Answer], quiz: &Quiz) -> ScoreReport {
    let by_question: HashMap<i64, &str> = answers
        .iter()
        .map(|a| (a.question_id, a.selected_option.as_str()))
        .collect();

    let mut total_score = 0.0;
    let answer_details: Vec<ScoredAnswer> = quiz
        .questions()
        .map(|question| {
            let selected = by_question.get(&question.id).copied();
            let marks = selected
                .map(|s| marks_for(s, question.correct_answer.as_deref()))
                .unwrap_or(0.0);
            total_score += marks;
            ScoredAnswer {
                question_id: question.id,
                selected_option: selected.map(str::to_string),
                correct_answer: question.correct_answer.clone(),
                is_correct: marks == FULL_MARK,
                marks_awarded: marks,
            }
        })
        .collect();

    ScoreReport {
        total_score,
        total_questions: answer_details.len(),
        answer_details,
    }
}

/// Scores a stored submission into its participant-facing result.
pub fn score_submission(submission: &Submission, quiz: &Quiz) -> SubmissionResult {
    let report = score(&submission.answers, quiz);
    SubmissionResult {
        submission_id: submission.id,
        score: report.total_score,
        total_questions: report.total_questions,
        answer_details: report.answer_details,
        trigger: submission.trigger,
        submitted_at: submission.submitted_at,
    }
}
