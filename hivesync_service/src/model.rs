/// Core data types for the Hive sync and assessment service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O: regions, stations and observations on the climate
/// side, scenarios, benchmarks, metrics, configurations and recommendations
/// on the assessment side, plus the error types shared across layers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// String-backed enumerations
// ---------------------------------------------------------------------------

/// Returned when a stored or user-supplied string names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a fieldless enum whose variants round-trip through the short
/// lowercase codes persisted in the store. Codes must equal the snake_case
/// variant name so serde and `FromStr` agree.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($code => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

coded_enum! {
    /// Four-level quality grade. Used for metric status and for
    /// observation data quality.
    ///
    /// Variants are declared best-first, so `Excellent < Poor` under `Ord`.
    Grade, "grade" {
        Excellent => "excellent",
        Good => "good",
        Fair => "fair",
        Poor => "poor",
    }
}

impl PartialOrd for Grade {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Grade {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

coded_enum! {
    /// The fixed set of assessment scenario categories.
    ScenarioCategory, "scenario category" {
        Joins => "joins",
        Aggregation => "aggregation",
        ComplexTypes => "complex_types",
        Io => "io",
        Partitioning => "partitioning",
    }
}

impl ScenarioCategory {
    /// Human-readable label shown in listings.
    pub fn label(&self) -> &'static str {
        match self {
            ScenarioCategory::Joins => "Large-Table JOIN Performance",
            ScenarioCategory::Aggregation => "Complex Aggregations",
            ScenarioCategory::ComplexTypes => "Nested JSON/Arrays",
            ScenarioCategory::Io => "High I/O Read",
            ScenarioCategory::Partitioning => "Partition Pruning",
        }
    }
}

coded_enum! {
    /// Lifecycle of a benchmark run.
    ///
    ///   Pending → Success | Failed | Timeout
    ///
    /// Running is implicit (the caller is blocked on the query) and never
    /// persisted. All three outcomes are terminal.
    BenchmarkStatus, "benchmark status" {
        Pending => "pending",
        Success => "success",
        Failed => "failed",
        Timeout => "timeout",
    }
}

impl BenchmarkStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BenchmarkStatus::Pending)
    }

    /// Only Pending may move, and only to a terminal state. There is no retry.
    pub fn can_transition_to(&self, next: BenchmarkStatus) -> bool {
        matches!(self, BenchmarkStatus::Pending) && next.is_terminal()
    }
}

coded_enum! {
    Priority, "priority" {
        Critical => "critical",
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

coded_enum! {
    ImpactLevel, "impact level" {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

coded_enum! {
    /// Grouping of Hive configuration settings.
    ConfigCategory, "configuration category" {
        Join => "join",
        Aggregation => "aggregation",
        Io => "io",
        Partitioning => "partitioning",
        Execution => "execution",
        Other => "other",
    }
}

impl ConfigCategory {
    /// Category recorded for configurations first created while deriving
    /// recommendations for `category`.
    ///
    /// The lookup is by the scenario code, so `joins` and `complex_types`
    /// have no matching configuration category and land in `Other`.
    pub fn for_scenario(category: ScenarioCategory) -> ConfigCategory {
        match category.as_str().parse::<ConfigCategory>() {
            Ok(c @ (ConfigCategory::Join
            | ConfigCategory::Aggregation
            | ConfigCategory::Io
            | ConfigCategory::Partitioning)) => c,
            _ => ConfigCategory::Other,
        }
    }
}

coded_enum! {
    ImportType, "import type" {
        Full => "full",
        Incremental => "incremental",
        Manual => "manual",
    }
}

coded_enum! {
    ImportStatus, "import status" {
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

// ---------------------------------------------------------------------------
// Climate types
// ---------------------------------------------------------------------------

/// Geographic region grouping stations. `code` and `name` are both unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: String,
}

/// A weather station, keyed externally by `station_id` (e.g. "KE-EAS-00042").
///
/// `id` is the store's surrogate key; rows staged for insertion carry 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: i64,
    pub station_id: String,
    pub station_name: String,
    pub country: String, // ISO 3166 alpha-2
    pub region_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>, // meters
    pub is_coastal: bool,
    pub is_active: bool,
}

/// One day of climate and ocean measurements at a station.
///
/// Natural key is (`station`, `observation_date`), where `station` is the
/// owning station's surrogate id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub station: i64,
    pub observation_date: NaiveDate,
    pub year: i32,
    pub month: i32,
    pub temp_max: Option<f64>,         // °C
    pub temp_min: Option<f64>,         // °C
    pub temp_mean: Option<f64>,        // °C
    pub precipitation: Option<f64>,    // mm
    pub humidity: Option<f64>,         // %
    pub sea_surface_temp: Option<f64>, // °C, coastal stations only
    pub ocean_salinity: Option<f64>,   // PSU, coastal stations only
    pub data_quality: Grade,
}

/// Bookkeeping row for one sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportLog {
    pub id: i64,
    pub import_type: ImportType,
    pub source: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: ImportStatus,
    pub records_processed: i64,
    pub records_imported: i64,
    pub records_updated: i64,
    pub records_failed: i64,
    pub error_message: String,
}

impl ImportLog {
    /// Seconds between start and end, once the run has finished.
    pub fn duration_secs(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0)
    }
}

// ---------------------------------------------------------------------------
// Assessment types
// ---------------------------------------------------------------------------

/// A named test definition: the query to run and the category that selects
/// its metric definitions and recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: i64,
    pub name: String,
    pub category: ScenarioCategory,
    pub description: String,
    pub test_query: String,
    pub record_count: i64,
    pub is_active: bool,
}

/// One timed execution (live or simulated) of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub id: i64,
    pub scenario_id: i64,
    pub query_executed: String,
    pub execution_time: f64, // seconds
    pub rows_processed: Option<i64>,
    pub rows_returned: Option<i64>,
    pub status: BenchmarkStatus,
    pub error_message: String,
    pub executed_at: DateTime<Utc>,
    pub simulated: bool,
}

/// A derived measurement attached to a benchmark. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: i64,
    pub benchmark_id: i64,
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub target: Option<f64>,
    pub status: Grade,
}

/// A Hive setting, unique per (`setting_key`, `setting_value`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub setting_key: String,
    pub setting_value: String,
    pub category: ConfigCategory,
    pub impact_level: ImpactLevel,
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.setting_key, self.setting_value)
    }
}

/// Suggested configuration change for a benchmark. `is_applied` is the only
/// field that changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    pub benchmark_id: i64,
    pub configuration_id: i64,
    pub priority: Priority,
    pub reason: String,
    pub expected_improvement: String,
    pub is_applied: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by an upstream query source (Hive gateway or CSV files).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source could not be reached at all.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The source was reached but did not answer in time.
    #[error("query timed out: {0}")]
    Timeout(String),
    /// Non-2xx HTTP response from the gateway.
    #[error("HTTP error: {0}")]
    Http(u16),
    /// The source accepted the request but rejected the statement.
    #[error("query rejected: {0}")]
    Query(String),
    /// The response body could not be interpreted.
    #[error("parse error: {0}")]
    Parse(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SourceError::Timeout(_))
    }
}

/// Errors raised by the local relational store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Postgres(#[from] postgres::Error),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    /// A uniqueness or foreign key rule was violated.
    #[error("constraint violated: {0}")]
    Constraint(String),
    /// A persisted value could not be mapped back into the domain model.
    #[error("corrupt row: {0}")]
    Corrupt(#[from] UnknownVariant),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_category_codes_round_trip() {
        for category in ScenarioCategory::ALL {
            let parsed: ScenarioCategory = category.as_str().parse().unwrap();
            assert_eq!(&parsed, category);
        }
        assert_eq!(ScenarioCategory::ComplexTypes.as_str(), "complex_types");
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let err = "graphs".parse::<ScenarioCategory>().unwrap_err();
        assert_eq!(err.kind, "scenario category");
        assert_eq!(err.value, "graphs");
    }

    #[test]
    fn test_grades_order_best_first() {
        assert!(Grade::Excellent < Grade::Good);
        assert!(Grade::Good < Grade::Fair);
        assert!(Grade::Fair < Grade::Poor);
    }

    #[test]
    fn test_only_pending_benchmarks_transition() {
        assert!(BenchmarkStatus::Pending.can_transition_to(BenchmarkStatus::Success));
        assert!(BenchmarkStatus::Pending.can_transition_to(BenchmarkStatus::Timeout));
        assert!(!BenchmarkStatus::Pending.can_transition_to(BenchmarkStatus::Pending));
        assert!(!BenchmarkStatus::Failed.can_transition_to(BenchmarkStatus::Success));
        assert!(!BenchmarkStatus::Success.can_transition_to(BenchmarkStatus::Failed));
    }

    #[test]
    fn test_config_category_for_scenario() {
        assert_eq!(
            ConfigCategory::for_scenario(ScenarioCategory::Aggregation),
            ConfigCategory::Aggregation
        );
        assert_eq!(ConfigCategory::for_scenario(ScenarioCategory::Io), ConfigCategory::Io);
        assert_eq!(
            ConfigCategory::for_scenario(ScenarioCategory::Partitioning),
            ConfigCategory::Partitioning
        );
        assert_eq!(ConfigCategory::for_scenario(ScenarioCategory::Joins), ConfigCategory::Other);
        assert_eq!(
            ConfigCategory::for_scenario(ScenarioCategory::ComplexTypes),
            ConfigCategory::Other
        );
    }

    #[test]
    fn test_grade_serializes_as_lowercase_code() {
        let json = serde_json::to_string(&Grade::Excellent).unwrap();
        assert_eq!(json, "\"excellent\"");
    }
}
