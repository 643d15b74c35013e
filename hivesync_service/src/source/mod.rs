/// Upstream query sources.
///
/// The warehouse is reached through a SQL-like interface: a query string in,
/// column names plus rows of nullable text cells out. Two sources implement
/// it:
/// - `gateway`: Apache Hive behind an HTTP SQL gateway (live mode).
/// - `csv`: fixed-schema CSV exports used when Hive is unavailable.
///
/// Both hand their rows to the sync layer as [`Record`]s, so parsing and
/// validation happen in exactly one place regardless of where data came from.

pub mod csv;
pub mod gateway;

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use crate::model::SourceError;

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// Tabular result of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Consumes the result into per-row views sharing one column list.
    pub fn into_records(self) -> impl Iterator<Item = Record> {
        let columns: Arc<[String]> = self.columns.into();
        self.rows.into_iter().map(move |values| Record::new(Arc::clone(&columns), values))
    }

    /// First cell of every row, skipping nulls. Used for SHOW statements.
    pub fn first_column(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first().cloned().flatten())
            .collect()
    }
}

/// Column description returned by `DESCRIBE <table>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub comment: String,
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Anything that can answer a query string with a [`QueryResult`].
///
/// Calls block for the full duration of the query; there is no cooperative
/// cancellation. Implementations bound the wait with their own timeout and
/// report it as [`SourceError::Timeout`].
pub trait QuerySource {
    fn execute(&mut self, query: &str) -> Result<QueryResult, SourceError>;

    /// Short human-readable location, e.g. `hive@gateway:10001/default`.
    fn describe(&self) -> String;

    /// Runs `SELECT 1` and checks the answer. Never errors.
    fn test_connection(&mut self) -> bool {
        match self.execute("SELECT 1") {
            Ok(result) => result.first_column().first().map(|v| v.trim() == "1").unwrap_or(false),
            Err(_) => false,
        }
    }

    fn databases(&mut self) -> Result<Vec<String>, SourceError> {
        Ok(self.execute("SHOW DATABASES")?.first_column())
    }

    fn tables(&mut self, database: &str) -> Result<Vec<String>, SourceError> {
        Ok(self.execute(&format!("SHOW TABLES IN {}", database))?.first_column())
    }

    /// Column list of `table`, without the `#` section markers Hive mixes in.
    fn table_schema(&mut self, table: &str) -> Result<Vec<ColumnInfo>, SourceError> {
        let result = self.execute(&format!("DESCRIBE {}", table))?;
        Ok(parse_describe(&result))
    }
}

fn parse_describe(result: &QueryResult) -> Vec<ColumnInfo> {
    let cell = |row: &[Option<String>], i: usize| {
        row.get(i).cloned().flatten().map(|s| s.trim().to_string()).unwrap_or_default()
    };

    result
        .rows
        .iter()
        .filter_map(|row| {
            let name = cell(row, 0);
            if name.is_empty() || name.starts_with('#') {
                return None;
            }
            Some(ColumnInfo { name, data_type: cell(row, 1), comment: cell(row, 2) })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Why a field could not be read from a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("missing required field '{0}'")]
    Missing(String),
    #[error("field '{field}' has invalid {expected} value {value:?}")]
    Invalid { field: String, value: String, expected: &'static str },
}

/// One row of a source result, addressed by column name.
///
/// Hive may qualify column names with the table (`obs.station_id`); lookups
/// match either the full name or the part after the last dot. Empty cells
/// and the usual null markers read as missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Option<String>>,
}

const NULL_MARKERS: &[&str] = &["null", "NULL", "None", "nan", "NaN", "\\N"];

impl Record {
    pub fn new(columns: Arc<[String]>, values: Vec<Option<String>>) -> Self {
        Record { columns, values }
    }

    /// Convenience constructor for literal rows.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let columns: Arc<[String]> = pairs.iter().map(|(c, _)| c.to_string()).collect();
        let values = pairs.iter().map(|(_, v)| Some(v.to_string())).collect();
        Record::new(columns, values)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name || c.rsplit('.').next() == Some(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Trimmed cell text, or `None` when absent, empty, or a null marker.
    pub fn raw(&self, name: &str) -> Option<&str> {
        let value = self.values.get(self.index_of(name)?)?.as_deref()?.trim();
        if value.is_empty() || NULL_MARKERS.contains(&value) {
            None
        } else {
            Some(value)
        }
    }

    pub fn text(&self, name: &str) -> Result<&str, FieldError> {
        self.raw(name).ok_or_else(|| FieldError::Missing(name.to_string()))
    }

    pub fn float(&self, name: &str) -> Result<Option<f64>, FieldError> {
        match self.raw(name) {
            None => Ok(None),
            Some(v) => match v.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Some(f)),
                _ => Err(self.invalid(name, v, "numeric")),
            },
        }
    }

    pub fn require_float(&self, name: &str) -> Result<f64, FieldError> {
        self.float(name)?.ok_or_else(|| FieldError::Missing(name.to_string()))
    }

    /// Integer field. Accepts `"2024"` and warehouse-style `"2024.0"`.
    pub fn int(&self, name: &str) -> Result<i32, FieldError> {
        let v = self.text(name)?;
        if let Ok(i) = v.parse::<i32>() {
            return Ok(i);
        }
        match v.parse::<f64>() {
            Ok(f) if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 => Ok(f as i32),
            _ => Err(self.invalid(name, v, "integer")),
        }
    }

    /// ISO date. A trailing time part (`2024-03-01 00:00:00`) is ignored.
    pub fn date(&self, name: &str) -> Result<NaiveDate, FieldError> {
        let v = self.text(name)?;
        let day = v.get(..10).unwrap_or(v);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| self.invalid(name, v, "date"))
    }

    pub fn flag(&self, name: &str) -> Result<Option<bool>, FieldError> {
        match self.raw(name) {
            None => Ok(None),
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" | "y" => Ok(Some(true)),
                "false" | "f" | "0" | "no" | "n" => Ok(Some(false)),
                _ => Err(self.invalid(name, v, "boolean")),
            },
        }
    }

    fn invalid(&self, name: &str, value: &str, expected: &'static str) -> FieldError {
        FieldError::Invalid { field: name.to_string(), value: value.to_string(), expected }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn obs_record() -> Record {
        Record::from_pairs(&[
            ("obs.station_id", "KE-EAS-00001"),
            ("observation_date", "2023-06-14 00:00:00"),
            ("year", "2023.0"),
            ("temp_max", "31.4"),
            ("temp_min", ""),
            ("sea_surface_temp", "NULL"),
            ("humidity", "wet"),
            ("is_coastal", "True"),
        ])
    }

    #[test]
    fn test_qualified_column_names_resolve() {
        let record = obs_record();
        assert_eq!(record.text("station_id"), Ok("KE-EAS-00001"));
        assert_eq!(record.text("obs.station_id"), Ok("KE-EAS-00001"));
    }

    #[test]
    fn test_null_markers_read_as_missing() {
        let record = obs_record();
        assert_eq!(record.float("temp_min"), Ok(None));
        assert_eq!(record.float("sea_surface_temp"), Ok(None));
        assert_eq!(record.float("not_a_column"), Ok(None));
        assert_eq!(record.text("temp_min"), Err(FieldError::Missing("temp_min".to_string())));
    }

    #[test]
    fn test_typed_accessors() {
        let record = obs_record();
        assert_eq!(record.float("temp_max"), Ok(Some(31.4)));
        assert_eq!(record.int("year"), Ok(2023));
        assert_eq!(
            record.date("observation_date").unwrap(),
            NaiveDate::from_ymd_opt(2023, 6, 14).unwrap()
        );
        assert_eq!(record.flag("is_coastal"), Ok(Some(true)));
    }

    #[test]
    fn test_unparseable_numeric_is_invalid() {
        let record = obs_record();
        let err = record.float("humidity").unwrap_err();
        assert!(matches!(err, FieldError::Invalid { ref field, .. } if field == "humidity"));
    }

    #[test]
    fn test_describe_skips_section_markers() {
        let result = QueryResult {
            columns: vec!["col_name".into(), "data_type".into(), "comment".into()],
            rows: vec![
                vec![Some("station_id".into()), Some("string ".into()), None],
                vec![Some("".into()), None, None],
                vec![Some("# Partition Information".into()), None, None],
                vec![Some("year".into()), Some("int".into()), Some("partition".into())],
            ],
        };
        let schema = parse_describe(&result);
        assert_eq!(schema.len(), 2);
        assert_eq!(schema[0].data_type, "string");
        assert_eq!(schema[1].comment, "partition");
    }

    #[test]
    fn test_records_share_columns() {
        let result = QueryResult {
            columns: vec!["a".into(), "b".into()],
            rows: vec![vec![Some("1".into()), None], vec![Some("2".into()), Some("x".into())]],
        };
        let records: Vec<Record> = result.into_records().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].raw("b"), Some("x"));
        assert_eq!(records[0].raw("b"), None);
    }
}
