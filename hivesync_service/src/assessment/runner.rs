//! Benchmark execution.
//!
//! A run starts Pending, blocks while the query executes (Running is never
//! stored), and ends in exactly one terminal state:
//!
//! - `success`: the query answered in time. Metrics and recommendations
//!   are derived.
//! - `timeout`: the source reported a timeout, or the run exceeded the
//!   configured maximum duration.
//! - `failed`: any other source error.
//!
//! Timeout and failure record the error message and derive nothing. There
//! are no retries. Simulated runs skip the source and draw an execution time
//! from the category's range instead.

use rand::Rng;
use serde::Serialize;
use std::time::Instant;

use crate::assessment::{metrics, recommend, AssessError};
use crate::logging::{self, LogSource};
use crate::model::{Benchmark, BenchmarkStatus, Scenario, ScenarioCategory};
use crate::source::QuerySource;
use crate::store::Store;

/// Execution time range, in seconds, for simulated runs.
pub fn simulated_range(category: ScenarioCategory) -> (f64, f64) {
    match category {
        ScenarioCategory::Joins => (1.5, 4.0),
        ScenarioCategory::Aggregation => (2.0, 6.0),
        ScenarioCategory::ComplexTypes => (2.5, 7.0),
        ScenarioCategory::Io => (3.0, 8.0),
        ScenarioCategory::Partitioning => (0.4, 2.0),
    }
}

const SIMULATED_ROWS: (i64, i64) = (100, 50_000);

/// What the caller gets back from one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub benchmark_id: i64,
    pub scenario: String,
    pub status: BenchmarkStatus,
    pub execution_time: f64,
    pub rows_returned: Option<i64>,
    pub error: Option<String>,
    pub simulated: bool,
    pub metrics: usize,
    pub recommendations: usize,
}

/// Measured result of executing (or simulating) a scenario query.
struct Execution {
    status: BenchmarkStatus,
    elapsed: f64,
    rows_returned: Option<i64>,
    error: String,
}

pub struct BenchmarkRunner<'a, R: Rng> {
    store: &'a mut dyn Store,
    source: Option<&'a mut dyn QuerySource>,
    rng: R,
    max_duration_secs: Option<f64>,
}

impl<'a, R: Rng> BenchmarkRunner<'a, R> {
    pub fn new(store: &'a mut dyn Store, rng: R) -> Self {
        BenchmarkRunner { store, source: None, rng, max_duration_secs: None }
    }

    /// Source for live runs. Simulated runs never touch it.
    pub fn with_source(mut self, source: &'a mut dyn QuerySource) -> Self {
        self.source = Some(source);
        self
    }

    /// Runs slower than this end as `timeout` even if the query answered.
    pub fn with_max_duration(mut self, max_duration_secs: Option<f64>) -> Self {
        self.max_duration_secs = max_duration_secs;
        self
    }

    /// Run scenario `scenario_id`. `record_count` overrides the scenario's
    /// default rows-processed figure.
    pub fn run(
        &mut self,
        scenario_id: i64,
        record_count: Option<i64>,
        simulate: bool,
    ) -> Result<RunOutcome, AssessError> {
        let scenario = self
            .store
            .find_scenario(scenario_id)?
            .ok_or_else(|| AssessError::ScenarioNotFound(scenario_id.to_string()))?;
        if !simulate && self.source.is_none() {
            return Err(AssessError::NoSource);
        }
        if !scenario.is_active {
            logging::warn(LogSource::Bench, Some(&scenario.name), "scenario is inactive, running anyway");
        }

        let record_count = record_count.unwrap_or(scenario.record_count);
        logging::info(
            LogSource::Bench,
            Some(&scenario.name),
            &format!("{} run over {} records", if simulate { "simulated" } else { "live" }, record_count),
        );

        let execution = if simulate { self.simulate(&scenario) } else { self.execute(&scenario)? };
        let execution = self.enforce_max_duration(execution);

        let status = execution.status;
        if !BenchmarkStatus::Pending.can_transition_to(status) {
            return Err(AssessError::InvalidTransition(status));
        }

        let benchmark = self.store.insert_benchmark(&Benchmark {
            id: 0,
            scenario_id: scenario.id,
            query_executed: scenario.test_query.clone(),
            execution_time: execution.elapsed,
            rows_processed: (status == BenchmarkStatus::Success).then_some(record_count),
            rows_returned: execution.rows_returned,
            status,
            error_message: execution.error.clone(),
            executed_at: chrono::Utc::now(),
            simulated: simulate,
        })?;

        let (metric_count, recommendation_count) = if status == BenchmarkStatus::Success {
            let metrics = metrics::record_metrics(&mut *self.store, benchmark.id, scenario.category, benchmark.execution_time)?;
            let recs = recommend::derive_recommendations(&mut *self.store, benchmark.id, scenario.category)?;
            (metrics.len(), recs.len())
        } else {
            (0, 0)
        };

        match status {
            BenchmarkStatus::Success => logging::info(
                LogSource::Bench,
                Some(&scenario.name),
                &format!(
                    "benchmark #{} succeeded in {:.3}s: {} metrics, {} recommendations",
                    benchmark.id, benchmark.execution_time, metric_count, recommendation_count
                ),
            ),
            _ => logging::warn(
                LogSource::Bench,
                Some(&scenario.name),
                &format!("benchmark #{} ended {}: {}", benchmark.id, status, execution.error),
            ),
        }

        Ok(RunOutcome {
            benchmark_id: benchmark.id,
            scenario: scenario.name,
            status,
            execution_time: benchmark.execution_time,
            rows_returned: benchmark.rows_returned,
            error: (!execution.error.is_empty()).then_some(execution.error),
            simulated: simulate,
            metrics: metric_count,
            recommendations: recommendation_count,
        })
    }

    fn execute(&mut self, scenario: &Scenario) -> Result<Execution, AssessError> {
        let source = self.source.as_deref_mut().ok_or(AssessError::NoSource)?;
        let location = source.describe();

        let started = Instant::now();
        let result = source.execute(&scenario.test_query);
        let elapsed = started.elapsed().as_secs_f64();

        Ok(match result {
            Ok(rows) => Execution {
                status: BenchmarkStatus::Success,
                elapsed,
                rows_returned: Some(rows.len() as i64),
                error: String::new(),
            },
            Err(e) => {
                logging::log_source_failure(LogSource::Bench, &location, &scenario.name, &e);
                let status = if e.is_timeout() { BenchmarkStatus::Timeout } else { BenchmarkStatus::Failed };
                Execution { status, elapsed, rows_returned: None, error: e.to_string() }
            }
        })
    }

    fn simulate(&mut self, scenario: &Scenario) -> Execution {
        let (low, high) = simulated_range(scenario.category);
        let elapsed = self.rng.gen_range(low..high);
        let rows = self.rng.gen_range(SIMULATED_ROWS.0..=SIMULATED_ROWS.1);
        Execution { status: BenchmarkStatus::Success, elapsed, rows_returned: Some(rows), error: String::new() }
    }

    fn enforce_max_duration(&self, execution: Execution) -> Execution {
        match self.max_duration_secs {
            Some(max) if execution.status == BenchmarkStatus::Success && execution.elapsed > max => Execution {
                status: BenchmarkStatus::Timeout,
                error: format!("exceeded maximum duration of {:.1}s ({:.3}s)", max, execution.elapsed),
                ..execution
            },
            _ => execution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceError, StoreError};
    use crate::source::QueryResult;
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct ScriptedSource {
        answer: Option<SourceError>,
    }

    impl QuerySource for ScriptedSource {
        fn execute(&mut self, _query: &str) -> Result<QueryResult, SourceError> {
            match self.answer.take() {
                Some(err) => Err(err),
                None => Ok(QueryResult {
                    columns: vec!["region".to_string()],
                    rows: vec![vec![Some("East".to_string())], vec![Some("West".to_string())]],
                }),
            }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn seeded(store: &mut MemoryStore, category: ScenarioCategory) -> Result<i64, StoreError> {
        let scenario = store.insert_scenario(&Scenario {
            id: 0,
            name: format!("{} scenario", category),
            category,
            description: String::new(),
            test_query: "SELECT region FROM africa_climate_observations".to_string(),
            record_count: 1_000_000,
            is_active: true,
        })?;
        Ok(scenario.id)
    }

    #[test]
    fn test_simulated_time_stays_in_category_range() {
        let mut store = MemoryStore::new();
        let id = seeded(&mut store, ScenarioCategory::Partitioning).unwrap();
        let mut runner = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(7));
        for _ in 0..20 {
            let outcome = runner.run(id, None, true).unwrap();
            assert_eq!(outcome.status, BenchmarkStatus::Success);
            assert!((0.4..2.0).contains(&outcome.execution_time));
            assert!(outcome.simulated);
            assert_eq!(outcome.metrics, 2);
            assert_eq!(outcome.recommendations, 3);
        }
    }

    #[test]
    fn test_same_seed_same_timing() {
        let mut store = MemoryStore::new();
        let id = seeded(&mut store, ScenarioCategory::Io).unwrap();
        let a = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(42)).run(id, None, true).unwrap();
        let b = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(42)).run(id, None, true).unwrap();
        assert_eq!(a.execution_time, b.execution_time);
        assert_eq!(a.rows_returned, b.rows_returned);
        assert_ne!(a.benchmark_id, b.benchmark_id);
    }

    #[test]
    fn test_live_run_counts_returned_rows() {
        let mut store = MemoryStore::new();
        let id = seeded(&mut store, ScenarioCategory::Aggregation).unwrap();
        let mut source = ScriptedSource { answer: None };
        let outcome = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(1))
            .with_source(&mut source)
            .run(id, Some(5_000), false)
            .unwrap();
        assert_eq!(outcome.status, BenchmarkStatus::Success);
        assert_eq!(outcome.rows_returned, Some(2));

        let benchmark = store.find_benchmark(outcome.benchmark_id).unwrap().unwrap();
        assert_eq!(benchmark.rows_processed, Some(5_000));
        assert!(!benchmark.simulated);
    }

    #[test]
    fn test_source_timeout_ends_as_timeout_without_derivation() {
        let mut store = MemoryStore::new();
        let id = seeded(&mut store, ScenarioCategory::Joins).unwrap();
        let mut source = ScriptedSource { answer: Some(SourceError::Timeout("300s elapsed".to_string())) };
        let outcome = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(1))
            .with_source(&mut source)
            .run(id, None, false)
            .unwrap();
        assert_eq!(outcome.status, BenchmarkStatus::Timeout);
        assert_eq!(outcome.metrics, 0);
        assert_eq!(outcome.recommendations, 0);
        assert!(outcome.error.unwrap().contains("300s elapsed"));
        assert_eq!(store.counts().unwrap().configurations, 0);
    }

    #[test]
    fn test_max_duration_turns_slow_success_into_timeout() {
        let mut store = MemoryStore::new();
        let id = seeded(&mut store, ScenarioCategory::Io).unwrap();
        let outcome = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(3))
            .with_max_duration(Some(1.0))
            .run(id, None, true)
            .unwrap();
        assert_eq!(outcome.status, BenchmarkStatus::Timeout);
        assert!(outcome.error.unwrap().contains("maximum duration"));
        assert!(store.benchmark_metrics(outcome.benchmark_id).unwrap().is_empty());
    }

    #[test]
    fn test_live_run_without_source_is_refused() {
        let mut store = MemoryStore::new();
        let id = seeded(&mut store, ScenarioCategory::Io).unwrap();
        let result = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(3)).run(id, None, false);
        assert!(matches!(result, Err(AssessError::NoSource)));
        assert_eq!(store.counts().unwrap().benchmarks, 0);
    }

    #[test]
    fn test_unknown_scenario() {
        let mut store = MemoryStore::new();
        let result = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(3)).run(99, None, true);
        assert!(matches!(result, Err(AssessError::ScenarioNotFound(_))));
    }
}
