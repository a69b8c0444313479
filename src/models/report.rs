// src/models/report.rs

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Count and share of one option within a population of answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OptionShare {
    pub option: String,
    pub count: u64,
    /// Percentage of the population, rounded to two decimals.
    pub percentage: f64,
}

/// How the answers of one category split across its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryDistribution {
    pub category: String,
    pub total_answers: u64,
    /// Every option of the category, used or not.
    pub options: Vec<OptionShare>,
}

/// Response of the distribution report.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DistributionReport {
    pub quiz_id: i64,
    /// Set when the population is a single participant.
    pub participant_id: Option<i64>,
    pub submissions: usize,
    pub categories: Vec<CategoryDistribution>,
    /// All categories folded together.
    pub overall: CategoryDistribution,
}

/// Population filter for reports.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PopulationParams {
    /// Restrict to one participant; omit for the whole cohort.
    pub participant_id: Option<i64>,
}

/// Query parameters for the leaderboard.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardParams {
    /// Number of entries (default: 10, max: 100).
    pub limit: Option<usize>,
}
