//! Request, response and status types exchanged with the Athena backend.
//!
//! Response types mirror the service's JSON shape (PascalCase field names) so
//! that fixture files read like the real API payloads.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Execution handle
// ---------------------------------------------------------------------------

/// Identifier the service hands back when a query is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryExecutionId(String);

impl QueryExecutionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the id is a hyphenated UUID (8-4-4-4-12 hex groups).
    pub fn is_canonical(&self) -> bool {
        self.0.len() == 36 && Uuid::parse_str(&self.0).is_ok()
    }
}

impl fmt::Display for QueryExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Everything needed to start one query execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionRequest {
    pub query_string: String,
    pub database: String,
    pub output_location: String,
}

/// Pagination arguments for `GetQueryResults`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub next_token: Option<String>,
    pub max_results: Option<i32>,
}

impl PageRequest {
    /// The first page with the service's default page size.
    pub fn first() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartQueryExecutionOutput {
    pub query_execution_id: QueryExecutionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetQueryExecutionOutput {
    pub query_execution: QueryExecution,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryExecution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_execution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<QueryExecutionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<QueryExecutionStatistics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_configuration: Option<ResultConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryExecutionStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_change_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryExecutionStatistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_execution_time_in_millis: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_scanned_in_bytes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_execution_time_in_millis: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
}

/// One page of `GetQueryResults`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryResults {
    #[serde(default)]
    pub result_set: ResultSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultSet {
    #[serde(default, deserialize_with = "null_as_default")]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub result_set_metadata: ResultSetMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultSetMetadata {
    #[serde(default)]
    pub column_info: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "Type", default)]
    pub data_type: String,
}

impl ColumnInfo {
    /// Display label, falling back to the column name.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Row {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<Datum>,
}

/// A single cell. An absent `VarCharValue` is how the service encodes NULL.
///
/// Decoding never fails: a cell with a wrong-typed value or an unexpected
/// shape decodes as NULL, and a container holding a single string under some
/// other key yields that string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", from = "serde_json::Value")]
pub struct Datum {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_char_value: Option<String>,
}

impl From<serde_json::Value> for Datum {
    fn from(value: serde_json::Value) -> Self {
        let serde_json::Value::Object(mut fields) = value else {
            return Self::null();
        };
        let value = match fields.remove("VarCharValue") {
            Some(value) => Some(value),
            None if fields.len() == 1 => fields.into_iter().next().map(|(_, v)| v),
            None => None,
        };
        match value {
            Some(serde_json::Value::String(s)) => Self::value(s),
            _ => Self::null(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Datum {
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            var_char_value: Some(value.into()),
        }
    }

    pub fn null() -> Self {
        Self::default()
    }
}

impl ResultSet {
    /// Column labels in result-set order.
    pub fn labels(&self) -> Vec<&str> {
        self.result_set_metadata
            .column_info
            .iter()
            .map(ColumnInfo::label)
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self.labels();
        if labels.is_empty() {
            return write!(f, "(empty result set)");
        }

        let cell = |datum: &Datum| datum.var_char_value.clone().unwrap_or_else(|| "NULL".into());

        let mut widths: Vec<usize> = labels.iter().map(|l| l.chars().count()).collect();
        for row in &self.rows {
            for (i, datum) in row.data.iter().enumerate().take(widths.len()) {
                widths[i] = widths[i].max(cell(datum).chars().count());
            }
        }

        for (i, label) in labels.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{:<width$}", label, width = widths[i])?;
        }
        writeln!(f)?;

        for (i, w) in widths.iter().enumerate() {
            if i > 0 {
                write!(f, "-+-")?;
            }
            write!(f, "{}", "-".repeat(*w))?;
        }
        writeln!(f)?;

        for row in &self.rows {
            for (i, datum) in row.data.iter().enumerate().take(widths.len()) {
                if i > 0 {
                    write!(f, " | ")?;
                }
                write!(f, "{:<width$}", cell(datum), width = widths[i])?;
            }
            writeln!(f)?;
        }

        write!(f, "({} rows)", self.rows.len())
    }
}

// ---------------------------------------------------------------------------
// Execution status
// ---------------------------------------------------------------------------

/// Execution state reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    /// Anything this crate does not recognise, including a missing state.
    Other(String),
}

impl QueryState {
    pub fn as_str(&self) -> &str {
        match self {
            QueryState::Queued => "QUEUED",
            QueryState::Running => "RUNNING",
            QueryState::Succeeded => "SUCCEEDED",
            QueryState::Failed => "FAILED",
            QueryState::Cancelled => "CANCELLED",
            QueryState::Other(s) => s,
        }
    }

    /// Only QUEUED and RUNNING can still change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueryState::Queued | QueryState::Running)
    }
}

impl From<&str> for QueryState {
    fn from(s: &str) -> Self {
        match s {
            "QUEUED" => QueryState::Queued,
            "RUNNING" => QueryState::Running,
            "SUCCEEDED" => QueryState::Succeeded,
            "FAILED" => QueryState::Failed,
            "CANCELLED" => QueryState::Cancelled,
            other => QueryState::Other(other.to_string()),
        }
    }
}

impl From<String> for QueryState {
    fn from(s: String) -> Self {
        QueryState::from(s.as_str())
    }
}

impl From<QueryState> for String {
    fn from(state: QueryState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status snapshot for one execution.
///
/// `run_time_ms` and `bytes_scanned` are only filled in on success, `error`
/// only on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub status: QueryState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_time_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_scanned: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionStatus {
    pub fn from_execution(qe: &QueryExecution) -> Self {
        let status = qe.status.as_ref();
        let state = status
            .and_then(|s| s.state.as_deref())
            .map(QueryState::from)
            .unwrap_or_else(|| QueryState::Other("UNKNOWN".into()));

        let mut out = ExecutionStatus {
            status: state,
            run_time_ms: None,
            bytes_scanned: None,
            error: None,
        };

        match out.status {
            QueryState::Succeeded => {
                let stats = qe.statistics.as_ref();
                out.run_time_ms = Some(
                    stats
                        .and_then(|s| s.engine_execution_time_in_millis)
                        .unwrap_or(0),
                );
                out.bytes_scanned = Some(stats.and_then(|s| s.data_scanned_in_bytes).unwrap_or(0));
            }
            QueryState::Failed => {
                let reason = status
                    .and_then(|s| s.state_change_reason.as_deref())
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or("unknown");
                out.error = Some(reason.to_string());
            }
            _ => {}
        }

        out
    }

    pub fn succeeded(&self) -> bool {
        self.status == QueryState::Succeeded
    }
}
