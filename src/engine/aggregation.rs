//! Read-time reduction of submissions into per-category option distributions.

use std::collections::HashMap;

use crate::models::{
    quiz::{Category, Quiz},
    report::{CategoryDistribution, OptionShare},
    submission::Submission,
};

/// Percentage of `count` in `total`, rounded to two decimals. Zero when the
/// population is empty.
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (100.0 * count as f64 / total as f64 * 100.0).round() / 100.0
}

/// Running per-option counter that keeps options in first-seen order.
#[derive(Debug, Default)]
struct Tally {
    options: Vec<String>,
    counts: Vec<u64>,
}

impl Tally {
    fn with_options<'a>(options: impl IntoIterator<Item = &'a String>) -> Self {
        let mut tally = Tally::default();
        for option in options {
            tally.slot(option);
        }
        tally
    }

    fn slot(&mut self, option: &str) -> usize {
        match self.options.iter().position(|o| o == option) {
            Some(i) => i,
            None => {
                self.options.push(option.to_string());
                self.counts.push(0);
                self.options.len() - 1
            }
        }
    }

    fn record(&mut self, option: &str) {
        let i = self.slot(option);
        self.counts[i] += 1;
    }

    fn into_distribution(self, category: String) -> CategoryDistribution {
        let total: u64 = self.counts.iter().sum();
        let options = self
            .options
            .into_iter()
            .zip(self.counts)
            .map(|(option, count)| OptionShare {
                option,
                count,
                percentage: percentage(count, total),
            })
            .collect();
        CategoryDistribution {
            category,
            total_answers: total,
            options,
        }
    }
}

fn category_options(category: &Category) -> impl Iterator<Item = &String> {
    category.questions.iter().flat_map(|q| q.options.iter())
}

/// One distribution per category, in quiz order.
///
/// Every category is present even with no answers, and every option of a
/// category is present even if nobody picked it. Submissions for other quizzes
/// and answers to unknown questions are skipped.
pub fn category_distribution<'a>(
    quiz: &Quiz,
    submissions: impl IntoIterator<Item = &'a Submission>,
) -> Vec<CategoryDistribution> {
    let mut owner: HashMap<i64, usize> = HashMap::new();
    for (index, category) in quiz.categories.iter().enumerate() {
        for question in &category.questions {
            owner.insert(question.id, index);
        }
    }

    let mut tallies: Vec<Tally> = quiz
        .categories
        .iter()
        .map(|c| Tally::with_options(category_options(c)))
        .collect();

    for submission in submissions.into_iter().filter(|s| s.quiz_id == quiz.id) {
        for answer in &submission.answers {
            if let Some(&index) = owner.get(&answer.question_id) {
                tallies[index].record(&answer.selected_option);
            }
        }
    }

    quiz.categories
        .iter()
        .zip(tallies)
        .map(|(category, tally)| tally.into_distribution(category.name.clone()))
        .collect()
}

/// Same reduction with every category folded into one bucket named after the
/// quiz.
pub fn overall_distribution<'a>(
    quiz: &Quiz,
    submissions: impl IntoIterator<Item = &'a Submission>,
) -> CategoryDistribution {
    let mut tally = Tally::with_options(quiz.categories.iter().flat_map(category_options));
    for submission in submissions.into_iter().filter(|s| s.quiz_id == quiz.id) {
        for answer in &submission.answers {
            if quiz.find_question(answer.question_id).is_some() {
                tally.record(&answer.selected_option);
            }
        }
    }
    tally.into_distribution(quiz.title.clone())
}
