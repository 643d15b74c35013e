/// Local relational store.
///
/// The [`Store`] trait is the only way the rest of the service touches
/// persisted data. Two implementations:
/// - `postgres`: the operational database (`PgStore`).
/// - `memory`: an in-process store with the same uniqueness and
///   reference rules, used by tests and dry runs (`MemoryStore`).
///
/// Rows passed to `insert_*` methods carry `id = 0`; the store assigns the
/// surrogate key and returns the stored row.

pub mod memory;
pub mod postgres;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{
    Benchmark, Configuration, ImportLog, Metric, Observation, Recommendation, Region, Scenario,
    Station, StoreError,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Row counts reported by the status command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub regions: usize,
    pub stations: usize,
    pub observations: usize,
    pub scenarios: usize,
    pub benchmarks: usize,
    pub configurations: usize,
    pub recommendations: usize,
}

pub trait Store {
    // --- Regions ------------------------------------------------------------

    /// Create or update the region with `code`. Returns the row and whether
    /// it was created.
    fn upsert_region(
        &mut self,
        code: &str,
        name: &str,
        description: &str,
    ) -> Result<(Region, bool), StoreError>;

    /// Case-insensitive match on name first, then on code.
    fn find_region(&mut self, name_or_code: &str) -> Result<Option<Region>, StoreError>;

    /// Return the region with `code`, creating it with `name` if absent.
    fn get_or_create_region(&mut self, code: &str, name: &str) -> Result<Region, StoreError>;

    // --- Stations -----------------------------------------------------------

    fn find_station(&mut self, station_id: &str) -> Result<Option<Station>, StoreError>;

    /// Insert, skipping rows whose `station_id` already exists.
    /// Returns how many were inserted.
    fn insert_stations(&mut self, rows: &[Station]) -> Result<usize, StoreError>;

    /// Update all non-key fields, matched by `station_id`.
    fn update_stations(&mut self, rows: &[Station]) -> Result<usize, StoreError>;

    // --- Observations -------------------------------------------------------

    fn find_observation(
        &mut self,
        station: i64,
        date: NaiveDate,
    ) -> Result<Option<Observation>, StoreError>;

    /// Insert, skipping rows whose (station, date) already exists.
    fn insert_observations(&mut self, rows: &[Observation]) -> Result<usize, StoreError>;

    /// Update the measurement fields, matched by (station, date).
    fn update_observations(&mut self, rows: &[Observation]) -> Result<usize, StoreError>;

    /// Newest first.
    fn station_observations(&mut self, station: i64, limit: usize) -> Result<Vec<Observation>, StoreError>;

    // --- Scenarios ----------------------------------------------------------

    fn insert_scenario(&mut self, scenario: &Scenario) -> Result<Scenario, StoreError>;

    fn find_scenario(&mut self, id: i64) -> Result<Option<Scenario>, StoreError>;

    fn find_scenario_by_name(&mut self, name: &str) -> Result<Option<Scenario>, StoreError>;

    /// Ordered by category, then name.
    fn list_scenarios(&mut self, active_only: bool) -> Result<Vec<Scenario>, StoreError>;

    // --- Benchmarks and metrics ---------------------------------------------

    fn insert_benchmark(&mut self, benchmark: &Benchmark) -> Result<Benchmark, StoreError>;

    fn find_benchmark(&mut self, id: i64) -> Result<Option<Benchmark>, StoreError>;

    /// Newest first.
    fn recent_benchmarks(&mut self, limit: usize) -> Result<Vec<Benchmark>, StoreError>;

    fn insert_metric(&mut self, metric: &Metric) -> Result<Metric, StoreError>;

    /// Ordered by metric name.
    fn benchmark_metrics(&mut self, benchmark_id: i64) -> Result<Vec<Metric>, StoreError>;

    // --- Configurations and recommendations ---------------------------------

    /// Return the configuration with the same (key, value) as `seed`, or
    /// insert `seed`. Returns the row and whether it was created.
    fn get_or_create_configuration(
        &mut self,
        seed: &Configuration,
    ) -> Result<(Configuration, bool), StoreError>;

    fn find_configuration(&mut self, id: i64) -> Result<Option<Configuration>, StoreError>;

    fn insert_recommendation(
        &mut self,
        recommendation: &Recommendation,
    ) -> Result<Recommendation, StoreError>;

    /// In creation order.
    fn benchmark_recommendations(&mut self, benchmark_id: i64) -> Result<Vec<Recommendation>, StoreError>;

    /// Newest first.
    fn list_recommendations(&mut self, limit: usize) -> Result<Vec<Recommendation>, StoreError>;

    /// Returns `false` when no recommendation has `id`.
    fn set_recommendation_applied(&mut self, id: i64, applied: bool) -> Result<bool, StoreError>;

    // --- Import logs --------------------------------------------------------

    fn insert_import_log(&mut self, log: &ImportLog) -> Result<ImportLog, StoreError>;

    fn update_import_log(&mut self, log: &ImportLog) -> Result<(), StoreError>;

    /// Newest first.
    fn recent_import_logs(&mut self, limit: usize) -> Result<Vec<ImportLog>, StoreError>;

    // --- Housekeeping -------------------------------------------------------

    fn counts(&mut self) -> Result<StoreCounts, StoreError>;

    /// Delete observations, stations and regions, in that order.
    fn clear_climate_data(&mut self) -> Result<(), StoreError>;
}
