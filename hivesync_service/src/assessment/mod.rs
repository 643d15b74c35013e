//! Hive performance assessment: scenario catalog, benchmark runs, metric
//! grading and configuration recommendations.

pub mod catalog;
pub mod classify;
pub mod metrics;
pub mod recommend;
pub mod report;
pub mod runner;

use crate::model::{BenchmarkStatus, StoreError};

pub use report::{apply_recommendation, benchmark_history, benchmark_report, list_recommendations};
pub use runner::{BenchmarkRunner, RunOutcome};

#[derive(Debug, thiserror::Error)]
pub enum AssessError {
    #[error("scenario not found: {0}")]
    ScenarioNotFound(String),
    #[error("benchmark not found: {0}")]
    BenchmarkNotFound(i64),
    #[error("recommendation not found: {0}")]
    RecommendationNotFound(i64),
    /// A live run was requested without an upstream query source.
    #[error("no query source configured; run with --simulate or enable the hive gateway")]
    NoSource,
    #[error("benchmark cannot move from {0} to running")]
    InvalidTransition(BenchmarkStatus),
    #[error(transparent)]
    Store(#[from] StoreError),
}
