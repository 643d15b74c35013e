//! Read-side views over benchmarks: detail, recommendation listing and
//! history. All views serialize to JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::assessment::AssessError;
use crate::model::{Benchmark, BenchmarkStatus, Grade, Priority, Recommendation};
use crate::store::Store;

/// Benchmarks considered by [`benchmark_history`].
pub const HISTORY_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// Detail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricView {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub target: Option<f64>,
    pub status: Grade,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationView {
    pub id: i64,
    pub benchmark_id: i64,
    /// `key=value`
    pub setting: String,
    pub details: String,
    pub priority: Priority,
    pub expected_improvement: String,
    pub is_applied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub benchmark_id: i64,
    pub scenario: String,
    pub description: String,
    pub test_query: String,
    pub execution_time: f64,
    pub status: BenchmarkStatus,
    pub error_message: String,
    pub simulated: bool,
    pub executed_at: DateTime<Utc>,
    pub metrics: Vec<MetricView>,
    pub recommendations: Vec<RecommendationView>,
}

fn recommendation_view(store: &mut dyn Store, rec: Recommendation) -> Result<RecommendationView, AssessError> {
    let setting = match store.find_configuration(rec.configuration_id)? {
        Some(config) => config.to_string(),
        None => format!("<configuration #{}>", rec.configuration_id),
    };
    Ok(RecommendationView {
        id: rec.id,
        benchmark_id: rec.benchmark_id,
        setting,
        details: rec.reason,
        priority: rec.priority,
        expected_improvement: rec.expected_improvement,
        is_applied: rec.is_applied,
    })
}

pub fn benchmark_report(store: &mut dyn Store, benchmark_id: i64) -> Result<BenchmarkReport, AssessError> {
    let benchmark = store
        .find_benchmark(benchmark_id)?
        .ok_or(AssessError::BenchmarkNotFound(benchmark_id))?;
    let scenario = store
        .find_scenario(benchmark.scenario_id)?
        .ok_or_else(|| AssessError::ScenarioNotFound(benchmark.scenario_id.to_string()))?;

    let metrics = store
        .benchmark_metrics(benchmark_id)?
        .into_iter()
        .map(|m| MetricView { name: m.name, value: m.value, unit: m.unit, target: m.target, status: m.status })
        .collect();

    let mut recommendations = Vec::new();
    for rec in store.benchmark_recommendations(benchmark_id)? {
        recommendations.push(recommendation_view(store, rec)?);
    }

    Ok(BenchmarkReport {
        benchmark_id,
        scenario: scenario.name,
        description: scenario.description,
        test_query: benchmark.query_executed,
        execution_time: benchmark.execution_time,
        status: benchmark.status,
        error_message: benchmark.error_message,
        simulated: benchmark.simulated,
        executed_at: benchmark.executed_at,
        metrics,
        recommendations,
    })
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

/// Newest first.
pub fn list_recommendations(store: &mut dyn Store, limit: usize) -> Result<Vec<RecommendationView>, AssessError> {
    let mut views = Vec::new();
    for rec in store.list_recommendations(limit)? {
        views.push(recommendation_view(store, rec)?);
    }
    Ok(views)
}

pub fn apply_recommendation(store: &mut dyn Store, id: i64) -> Result<(), AssessError> {
    if store.set_recommendation_applied(id, true)? {
        Ok(())
    } else {
        Err(AssessError::RecommendationNotFound(id))
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkSummary {
    pub benchmark_id: i64,
    pub status: BenchmarkStatus,
    pub execution_time: f64,
    pub simulated: bool,
    pub executed_at: DateTime<Utc>,
}

impl From<&Benchmark> for BenchmarkSummary {
    fn from(b: &Benchmark) -> Self {
        BenchmarkSummary {
            benchmark_id: b.id,
            status: b.status,
            execution_time: b.execution_time,
            simulated: b.simulated,
            executed_at: b.executed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioHistory {
    pub scenario: String,
    pub benchmarks: Vec<BenchmarkSummary>,
    /// Mean execution time of successful runs, 0 when none succeeded.
    pub avg_time: f64,
}

/// The last [`HISTORY_LIMIT`] benchmarks grouped by scenario. Groups are
/// ordered by their most recent run.
pub fn benchmark_history(store: &mut dyn Store) -> Result<Vec<ScenarioHistory>, AssessError> {
    let mut groups: Vec<(i64, ScenarioHistory)> = Vec::new();

    for benchmark in store.recent_benchmarks(HISTORY_LIMIT)? {
        let index = match groups.iter().position(|(id, _)| *id == benchmark.scenario_id) {
            Some(i) => i,
            None => {
                let name = store
                    .find_scenario(benchmark.scenario_id)?
                    .map(|s| s.name)
                    .unwrap_or_else(|| format!("scenario #{}", benchmark.scenario_id));
                groups.push((
                    benchmark.scenario_id,
                    ScenarioHistory { scenario: name, benchmarks: Vec::new(), avg_time: 0.0 },
                ));
                groups.len() - 1
            }
        };
        groups[index].1.benchmarks.push(BenchmarkSummary::from(&benchmark));
    }

    Ok(groups
        .into_iter()
        .map(|(_, mut history)| {
            let times: Vec<f64> = history
                .benchmarks
                .iter()
                .filter(|b| b.status == BenchmarkStatus::Success)
                .map(|b| b.execution_time)
                .collect();
            if !times.is_empty() {
                history.avg_time = times.iter().sum::<f64>() / times.len() as f64;
            }
            history
        })
        .collect())
}
