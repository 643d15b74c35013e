/// Integration tests for Hive performance assessment
///
/// These tests verify:
/// 1. The default catalog loads once and runs in simulated mode
/// 2. Successful runs derive graded metrics and recommendations
/// 3. Failed and timed-out runs record the error and derive nothing
/// 4. Configurations are shared across benchmarks, recommendations are not
/// 5. Reports, recommendation listing and history read back what was run
///
/// Run with: cargo test --test assessment_integration

use rand::SeedableRng;
use rand::rngs::StdRng;

use hivesync_service::assessment::{self, AssessError, BenchmarkRunner, catalog};
use hivesync_service::assessment::classify::classify;
use hivesync_service::model::{BenchmarkStatus, ScenarioCategory, SourceError};
use hivesync_service::source::{QueryResult, QuerySource};
use hivesync_service::store::{MemoryStore, Store};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// Fails every query with the given error.
struct BrokenHive(fn() -> SourceError);

impl QuerySource for BrokenHive {
    fn execute(&mut self, _query: &str) -> Result<QueryResult, SourceError> {
        Err((self.0)())
    }

    fn describe(&self) -> String {
        "broken hive".to_string()
    }
}

fn store_with_catalog() -> MemoryStore {
    let mut store = MemoryStore::new();
    catalog::load_default_scenarios(&mut store, "africa_climate_observations", 1_000_000).unwrap();
    store
}

fn scenario_id(store: &mut MemoryStore, category: ScenarioCategory) -> i64 {
    store.find_scenario_by_name(category.label()).unwrap().unwrap().id
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[test]
fn test_simulated_run_derives_metrics_and_recommendations() {
    let mut store = store_with_catalog();
    let id = scenario_id(&mut store, ScenarioCategory::Joins);

    let outcome = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(11))
        .run(id, Some(5_000), true)
        .unwrap();

    assert_eq!(outcome.status, BenchmarkStatus::Success);
    assert!(outcome.simulated);
    assert!((1.5..4.0).contains(&outcome.execution_time));
    assert_eq!(outcome.metrics, 3);
    assert_eq!(outcome.recommendations, 3);

    let benchmark = store.find_benchmark(outcome.benchmark_id).unwrap().unwrap();
    assert_eq!(benchmark.rows_processed, Some(5_000));

    let metrics = store.benchmark_metrics(outcome.benchmark_id).unwrap();
    let time = metrics.iter().find(|m| m.name == "Query Execution Time").unwrap();
    assert!((time.value - outcome.execution_time * 1000.0).abs() < 1e-6);
    assert_eq!(time.target, Some(2000.0));
    assert_eq!(time.status, classify("Query Execution Time", time.value, 2000.0));
}

#[test]
fn test_failed_run_skips_derivation() {
    let mut store = store_with_catalog();
    let id = scenario_id(&mut store, ScenarioCategory::Aggregation);
    let mut hive = BrokenHive(|| SourceError::Query("Table not found 'africa_climate_observations'".to_string()));

    let outcome = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(1))
        .with_source(&mut hive)
        .run(id, None, false)
        .unwrap();

    assert_eq!(outcome.status, BenchmarkStatus::Failed);
    assert!(outcome.error.unwrap().contains("Table not found"));
    assert!(store.benchmark_metrics(outcome.benchmark_id).unwrap().is_empty());
    assert!(store.benchmark_recommendations(outcome.benchmark_id).unwrap().is_empty());

    let benchmark = store.find_benchmark(outcome.benchmark_id).unwrap().unwrap();
    assert_eq!(benchmark.rows_processed, None);
    assert!(!benchmark.simulated);
}

#[test]
fn test_upstream_timeout_is_terminal_timeout() {
    let mut store = store_with_catalog();
    let id = scenario_id(&mut store, ScenarioCategory::Io);
    let mut hive = BrokenHive(|| SourceError::Timeout("no answer after 300s".to_string()));

    let outcome = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(1))
        .with_source(&mut hive)
        .run(id, None, false)
        .unwrap();

    assert_eq!(outcome.status, BenchmarkStatus::Timeout);
    assert_eq!(outcome.metrics, 0);
    assert_eq!(outcome.recommendations, 0);
    assert_eq!(store.counts().unwrap().configurations, 0);
}

#[test]
fn test_unknown_scenario_is_an_error() {
    let mut store = store_with_catalog();
    let result = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(1)).run(999, None, true);
    assert!(matches!(result, Err(AssessError::ScenarioNotFound(_))));
    assert_eq!(store.counts().unwrap().benchmarks, 0);
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[test]
fn test_configurations_are_shared_across_benchmarks() {
    let mut store = store_with_catalog();
    let id = scenario_id(&mut store, ScenarioCategory::Partitioning);

    let (first, second) = {
        let mut runner = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(5));
        (runner.run(id, None, true).unwrap(), runner.run(id, None, true).unwrap())
    };

    let counts = store.counts().unwrap();
    assert_eq!(counts.benchmarks, 2);
    assert_eq!(counts.configurations, 3);
    assert_eq!(counts.recommendations, 6);

    let first_configs: Vec<i64> = store
        .benchmark_recommendations(first.benchmark_id)
        .unwrap()
        .iter()
        .map(|r| r.configuration_id)
        .collect();
    let second_configs: Vec<i64> = store
        .benchmark_recommendations(second.benchmark_id)
        .unwrap()
        .iter()
        .map(|r| r.configuration_id)
        .collect();
    assert_eq!(first_configs, second_configs);
}

#[test]
fn test_report_lists_settings_in_order() {
    let mut store = store_with_catalog();
    let id = scenario_id(&mut store, ScenarioCategory::Aggregation);
    let outcome = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(9)).run(id, None, true).unwrap();

    let report = assessment::benchmark_report(&mut store, outcome.benchmark_id).unwrap();
    assert_eq!(report.scenario, "Complex Aggregations");
    assert!(report.simulated);
    assert_eq!(report.metrics.len(), 2);

    let settings: Vec<&str> = report.recommendations.iter().map(|r| r.setting.as_str()).collect();
    assert_eq!(
        settings,
        vec!["hive.map.aggr=true", "hive.groupby.skewindata=true", "tez.grouping.max-size=1000000000"]
    );

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["recommendations"][0]["priority"], "high");
    assert_eq!(json["status"], "success");
}

#[test]
fn test_apply_recommendation() {
    let mut store = store_with_catalog();
    let id = scenario_id(&mut store, ScenarioCategory::ComplexTypes);
    BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(2)).run(id, None, true).unwrap();

    let listed = assessment::list_recommendations(&mut store, 50).unwrap();
    assert_eq!(listed.len(), 3);
    assert!(listed.iter().all(|r| !r.is_applied));

    let target = listed[1].id;
    assessment::apply_recommendation(&mut store, target).unwrap();

    let listed = assessment::list_recommendations(&mut store, 50).unwrap();
    let applied: Vec<i64> = listed.iter().filter(|r| r.is_applied).map(|r| r.id).collect();
    assert_eq!(applied, vec![target]);
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[test]
fn test_history_groups_runs_by_scenario() {
    let mut store = store_with_catalog();
    let joins = scenario_id(&mut store, ScenarioCategory::Joins);
    let io = scenario_id(&mut store, ScenarioCategory::Io);
    let mut hive = BrokenHive(|| SourceError::Connection("refused".to_string()));

    {
        let mut runner = BenchmarkRunner::new(&mut store, StdRng::seed_from_u64(3)).with_source(&mut hive);
        runner.run(joins, None, true).unwrap();
        runner.run(joins, None, true).unwrap();
        runner.run(joins, None, false).unwrap();
        runner.run(io, None, true).unwrap();
    }

    let history = assessment::benchmark_history(&mut store).unwrap();
    assert_eq!(history.len(), 2);

    let joins_history = history.iter().find(|h| h.scenario == "Large-Table JOIN Performance").unwrap();
    assert_eq!(joins_history.benchmarks.len(), 3);
    let successes: Vec<f64> = joins_history
        .benchmarks
        .iter()
        .filter(|b| b.status == BenchmarkStatus::Success)
        .map(|b| b.execution_time)
        .collect();
    assert_eq!(successes.len(), 2);
    let expected = successes.iter().sum::<f64>() / 2.0;
    assert!((joins_history.avg_time - expected).abs() < 1e-9);
}
