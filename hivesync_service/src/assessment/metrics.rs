//! Metric definitions per scenario category.
//!
//! Every metric is derived from the measured execution time `t` (seconds)
//! and graded against a fixed target.

use crate::assessment::classify::classify;
use crate::model::{Metric, ScenarioCategory, StoreError};
use crate::store::Store;

pub struct MetricDefinition {
    pub name: &'static str,
    pub unit: &'static str,
    pub target: f64,
    derive: fn(f64) -> f64,
}

impl MetricDefinition {
    pub fn value_for(&self, execution_time: f64) -> f64 {
        (self.derive)(execution_time)
    }
}

fn execution_ms(t: f64) -> f64 {
    t * 1000.0
}

fn spill_gb(t: f64) -> f64 {
    ((t - 2.0) * 1.25).max(0.0)
}

fn cpu_percent(t: f64) -> f64 {
    (70.0 + t / 10.0).min(95.0)
}

fn skew_ratio(t: f64) -> f64 {
    (t / 2.0).max(1.0)
}

fn deserialization_percent(t: f64) -> f64 {
    (t * 5.0).min(30.0)
}

fn read_mb_per_sec(t: f64) -> f64 {
    (500.0 - t * 50.0).max(100.0)
}

fn partitions_scanned(t: f64) -> f64 {
    (t / 0.5).trunc().max(1.0)
}

const fn execution_time(target_ms: f64) -> MetricDefinition {
    MetricDefinition { name: "Query Execution Time", unit: "ms", target: target_ms, derive: execution_ms }
}

static JOINS: &[MetricDefinition] = &[
    execution_time(2000.0),
    MetricDefinition { name: "Spill to Disk", unit: "GB", target: 0.5, derive: spill_gb },
    MetricDefinition { name: "CPU Utilization", unit: "%", target: 95.0, derive: cpu_percent },
];

static AGGREGATION: &[MetricDefinition] = &[
    execution_time(3500.0),
    MetricDefinition { name: "Data Skew Ratio", unit: "ratio", target: 1.5, derive: skew_ratio },
];

static COMPLEX_TYPES: &[MetricDefinition] = &[
    execution_time(4000.0),
    MetricDefinition {
        name: "Deserialization Overhead",
        unit: "%",
        target: 10.0,
        derive: deserialization_percent,
    },
];

static IO: &[MetricDefinition] = &[
    execution_time(4500.0),
    MetricDefinition { name: "Data Read", unit: "MB/s", target: 300.0, derive: read_mb_per_sec },
];

static PARTITIONING: &[MetricDefinition] = &[
    execution_time(800.0),
    MetricDefinition { name: "Partitions Scanned", unit: "count", target: 1.0, derive: partitions_scanned },
];

pub fn definitions(category: ScenarioCategory) -> &'static [MetricDefinition] {
    match category {
        ScenarioCategory::Joins => JOINS,
        ScenarioCategory::Aggregation => AGGREGATION,
        ScenarioCategory::ComplexTypes => COMPLEX_TYPES,
        ScenarioCategory::Io => IO,
        ScenarioCategory::Partitioning => PARTITIONING,
    }
}

/// Derive and grade the metrics for one run. Rows carry `id = 0`.
pub fn derive_metrics(benchmark_id: i64, category: ScenarioCategory, execution_time: f64) -> Vec<Metric> {
    definitions(category)
        .iter()
        .map(|def| {
            let value = def.value_for(execution_time);
            Metric {
                id: 0,
                benchmark_id,
                name: def.name.to_string(),
                value,
                unit: def.unit.to_string(),
                target: Some(def.target),
                status: classify(def.name, value, def.target),
            }
        })
        .collect()
}

/// Derive, grade and persist the metrics for a benchmark.
pub fn record_metrics(
    store: &mut dyn Store,
    benchmark_id: i64,
    category: ScenarioCategory,
    execution_time: f64,
) -> Result<Vec<Metric>, StoreError> {
    derive_metrics(benchmark_id, category, execution_time)
        .iter()
        .map(|metric| store.insert_metric(metric))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Grade;

    fn metric<'a>(metrics: &'a [Metric], name: &str) -> &'a Metric {
        metrics.iter().find(|m| m.name == name).unwrap()
    }

    #[test]
    fn test_every_category_reports_execution_time_first() {
        for category in ScenarioCategory::ALL {
            let defs = definitions(*category);
            assert_eq!(defs[0].name, "Query Execution Time");
            assert_eq!(defs[0].unit, "ms");
        }
    }

    #[test]
    fn test_join_metrics_at_two_and_a_half_seconds() {
        let metrics = derive_metrics(7, ScenarioCategory::Joins, 2.5);
        assert_eq!(metrics.len(), 3);

        let time = metric(&metrics, "Query Execution Time");
        assert_eq!(time.value, 2500.0);
        assert_eq!(time.status, Grade::Good);

        let spill = metric(&metrics, "Spill to Disk");
        assert!((spill.value - 0.625).abs() < 1e-9);
        assert_eq!(spill.status, Grade::Good);

        let cpu = metric(&metrics, "CPU Utilization");
        assert!((cpu.value - 70.25).abs() < 1e-9);
        assert_eq!(cpu.status, Grade::Fair);
        assert!(metrics.iter().all(|m| m.benchmark_id == 7));
    }

    #[test]
    fn test_value_clamps() {
        assert_eq!(spill_gb(1.0), 0.0);
        assert_eq!(cpu_percent(500.0), 95.0);
        assert_eq!(skew_ratio(0.4), 1.0);
        assert_eq!(deserialization_percent(10.0), 30.0);
        assert_eq!(read_mb_per_sec(9.0), 100.0);
        assert_eq!(read_mb_per_sec(2.0), 400.0);
    }

    #[test]
    fn test_partitions_scanned_truncates() {
        assert_eq!(partitions_scanned(0.2), 1.0);
        assert_eq!(partitions_scanned(1.9), 3.0);
        let metrics = derive_metrics(1, ScenarioCategory::Partitioning, 1.9);
        // Higher-is-better by name, so three partitions grade excellent.
        assert_eq!(metric(&metrics, "Partitions Scanned").status, Grade::Excellent);
        assert_eq!(metric(&metrics, "Query Execution Time").status, Grade::Poor);
    }
}
