//! Default assessment scenarios, one per category.
//!
//! Loading is idempotent by scenario name: existing scenarios are left
//! untouched, so edited queries survive a reload.

use crate::logging::{self, LogSource};
use crate::model::{Scenario, ScenarioCategory, StoreError};
use crate::store::Store;

/// The built-in scenario for `category`, querying `table`.
pub fn default_scenario(category: ScenarioCategory, table: &str, record_count: i64) -> Scenario {
    let (description, query) = match category {
        ScenarioCategory::Joins => (
            "Joins daily observations against per-station aggregates to stress shuffle and map-join conversion.",
            format!(
                "SELECT o.station_id, o.region, COUNT(*) AS readings, AVG(o.temp_mean - s.avg_temp) AS anomaly \
                 FROM {t} o \
                 JOIN (SELECT station_id, AVG(temp_mean) AS avg_temp FROM {t} GROUP BY station_id) s \
                 ON o.station_id = s.station_id \
                 GROUP BY o.station_id, o.region",
                t = table
            ),
        ),
        ScenarioCategory::Aggregation => (
            "Monthly climate statistics per region; sensitive to skew in the busiest regions.",
            format!(
                "SELECT region, year, month, AVG(temp_mean) AS avg_temp, MAX(temp_max) AS max_temp, \
                 MIN(temp_min) AS min_temp, SUM(precipitation) AS total_precip, COUNT(*) AS readings \
                 FROM {} GROUP BY region, year, month",
                table
            ),
        ),
        ScenarioCategory::ComplexTypes => (
            "Builds nested per-station arrays of readings to measure SerDe overhead.",
            format!(
                "SELECT station_id, \
                 collect_list(named_struct('date', observation_date, 'temp', temp_mean, 'precip', precipitation)) AS readings \
                 FROM {} GROUP BY station_id",
                table
            ),
        ),
        ScenarioCategory::Io => (
            "Full scan of every wet-day observation; bound by read throughput.",
            format!("SELECT * FROM {} WHERE precipitation > 0", table),
        ),
        ScenarioCategory::Partitioning => (
            "Reads a single year and region; should touch one partition.",
            format!(
                "SELECT COUNT(*) AS readings, AVG(temp_mean) AS avg_temp FROM {} \
                 WHERE year = 2024 AND region = 'East'",
                table
            ),
        ),
    };

    Scenario {
        id: 0,
        name: category.label().to_string(),
        category,
        description: description.to_string(),
        test_query: query,
        record_count,
        is_active: true,
    }
}

pub fn default_scenarios(table: &str, record_count: i64) -> Vec<Scenario> {
    ScenarioCategory::ALL
        .iter()
        .map(|category| default_scenario(*category, table, record_count))
        .collect()
}

/// Insert every default scenario not already present by name.
/// Returns (created, already present).
pub fn load_default_scenarios(
    store: &mut dyn Store,
    table: &str,
    record_count: i64,
) -> Result<(usize, usize), StoreError> {
    let mut created = 0;
    let mut existing = 0;
    for scenario in default_scenarios(table, record_count) {
        if store.find_scenario_by_name(&scenario.name)?.is_some() {
            existing += 1;
            continue;
        }
        let stored = store.insert_scenario(&scenario)?;
        logging::info(LogSource::Bench, Some(&stored.name), &format!("scenario #{} created", stored.id));
        created += 1;
    }
    Ok((created, existing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_one_scenario_per_category() {
        let scenarios = default_scenarios("obs", 1_000);
        assert_eq!(scenarios.len(), ScenarioCategory::ALL.len());
        for (scenario, category) in scenarios.iter().zip(ScenarioCategory::ALL) {
            assert_eq!(scenario.category, *category);
            assert!(scenario.test_query.contains("obs"));
            assert_eq!(scenario.record_count, 1_000);
        }
    }

    #[test]
    fn test_loading_twice_creates_nothing_new() {
        let mut store = MemoryStore::new();
        assert_eq!(load_default_scenarios(&mut store, "obs", 10).unwrap(), (5, 0));
        assert_eq!(load_default_scenarios(&mut store, "obs", 10).unwrap(), (0, 5));
        assert_eq!(store.list_scenarios(true).unwrap().len(), 5);
    }
}
