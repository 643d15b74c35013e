/// Hive SQL gateway client
///
/// Talks to HiveServer2 through an HTTP statement gateway: each statement is
/// POSTed as JSON to `<gateway_url>/v1/statements` and answered with
///
/// ```json
/// { "columns": ["station_id", "latitude"], "rows": [["KE-EAS-00001", -1.28]], "error": null }
/// ```
///
/// `columns` may also be objects of the form `{"name": "...", "type": "..."}`.
/// The client is constructed explicitly from [`HiveSettings`] and passed to
/// whoever needs it; there is no process-wide connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::config::HiveSettings;
use crate::logging::{self, LogSource};
use crate::model::SourceError;
use crate::source::{QueryResult, QuerySource};

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    database: &'a str,
    username: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    columns: Vec<GatewayColumn>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GatewayColumn {
    Name(String),
    Described { name: String },
}

impl GatewayColumn {
    fn into_name(self) -> String {
        match self {
            GatewayColumn::Name(name) | GatewayColumn::Described { name } => name,
        }
    }
}

/// Decode a gateway response body into a [`QueryResult`].
///
/// A non-null `error` field means the warehouse rejected the statement.
pub fn parse_statement_response(body: &str) -> Result<QueryResult, SourceError> {
    let response: StatementResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;

    if let Some(message) = response.error.filter(|m| !m.trim().is_empty()) {
        return Err(SourceError::Query(message));
    }

    let columns: Vec<String> = response.columns.into_iter().map(GatewayColumn::into_name).collect();
    let width = columns.len();

    let mut rows = Vec::with_capacity(response.rows.len());
    for (i, row) in response.rows.into_iter().enumerate() {
        if row.len() != width {
            return Err(SourceError::Parse(format!(
                "row {} has {} cells, expected {}",
                i,
                row.len(),
                width
            )));
        }
        rows.push(row.into_iter().map(cell_text).collect());
    }

    Ok(QueryResult { columns, rows })
}

fn cell_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct HiveGateway {
    client: reqwest::blocking::Client,
    base_url: String,
    database: String,
    username: String,
}

impl HiveGateway {
    pub fn new(settings: &HiveSettings) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        Ok(HiveGateway {
            client,
            base_url: settings.gateway_url.trim_end_matches('/').to_string(),
            database: settings.database.clone(),
            username: settings.username.clone(),
        })
    }

    pub fn statements_url(&self) -> String {
        format!("{}/v1/statements", self.base_url)
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

fn transport_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout(err.to_string())
    } else {
        SourceError::Connection(err.to_string())
    }
}

fn preview(query: &str) -> String {
    let flat = query.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 100 {
        format!("{}...", flat.chars().take(100).collect::<String>())
    } else {
        flat
    }
}

impl QuerySource for HiveGateway {
    fn execute(&mut self, query: &str) -> Result<QueryResult, SourceError> {
        logging::debug(LogSource::Hive, Some(&self.describe()), &format!("executing: {}", preview(query)));
        let started = Instant::now();

        let response = self
            .client
            .post(self.statements_url())
            .header("Accept", "application/json")
            .json(&StatementRequest { statement: query, database: &self.database, username: &self.username })
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().map_err(transport_error)?;

        if !status.is_success() {
            // Gateways answer rejected statements with 4xx and an error body.
            if status.is_client_error() {
                if let Err(err @ SourceError::Query(_)) = parse_statement_response(&body) {
                    return Err(err);
                }
            }
            return Err(SourceError::Http(status.as_u16()));
        }

        let result = parse_statement_response(&body)?;
        logging::debug(
            LogSource::Hive,
            Some(&self.describe()),
            &format!("{} rows in {:.2}s", result.len(), started.elapsed().as_secs_f64()),
        );
        Ok(result)
    }

    fn describe(&self) -> String {
        format!("hive@{}/{}", self.base_url, self.database)
    }
}

// ============================================================================
// Tests
// ============================================================================
