//! The three Athena calls the runner needs, behind one trait.
//!
//! [`SdkBackend`] talks to AWS; the fixture backends in
//! [`crate::fixture`] replay or capture those calls on disk.

use async_trait::async_trait;
use tracing::debug;

use crate::error::QthenaError;
use crate::model::{
    ColumnInfo, Datum, ExecutionRequest, PageRequest, QueryExecution, QueryExecutionId,
    QueryExecutionStatistics, QueryExecutionStatus, QueryResults, ResultConfiguration,
    ResultSet, ResultSetMetadata, Row,
};

/// Request/response access to the query service.
///
/// Implementations pass backend failures through as [`QthenaError::Backend`]
/// without retrying.
#[async_trait]
pub trait AthenaBackend: Send + Sync {
    /// `StartQueryExecution`: submit a query, get its handle back.
    async fn start_query_execution(
        &self,
        request: &ExecutionRequest,
    ) -> Result<QueryExecutionId, QthenaError>;

    /// `GetQueryExecution`: current state and statistics.
    async fn get_query_execution(
        &self,
        query_id: &QueryExecutionId,
    ) -> Result<QueryExecution, QthenaError>;

    /// `GetQueryResults`: one page of rows.
    async fn get_query_results(
        &self,
        query_id: &QueryExecutionId,
        page: &PageRequest,
    ) -> Result<QueryResults, QthenaError>;
}

// ---------------------------------------------------------------------------
// AWS SDK backend
// ---------------------------------------------------------------------------

/// Live backend on top of `aws_sdk_athena::Client`.
pub struct SdkBackend {
    athena_client: aws_sdk_athena::Client,
}

impl SdkBackend {
    pub fn new(sdk_config: &aws_types::SdkConfig) -> Self {
        Self {
            athena_client: aws_sdk_athena::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl AthenaBackend for SdkBackend {
    async fn start_query_execution(
        &self,
        request: &ExecutionRequest,
    ) -> Result<QueryExecutionId, QthenaError> {
        let resp = self
            .athena_client
            .start_query_execution()
            .query_string(&request.query_string)
            .query_execution_context(
                aws_sdk_athena::types::QueryExecutionContext::builder()
                    .database(&request.database)
                    .build(),
            )
            .result_configuration(
                aws_sdk_athena::types::ResultConfiguration::builder()
                    .output_location(&request.output_location)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| QthenaError::Backend(e.to_string()))?;

        resp.query_execution_id()
            .map(QueryExecutionId::new)
            .ok_or(QthenaError::MissingField("QueryExecutionId"))
    }

    async fn get_query_execution(
        &self,
        query_id: &QueryExecutionId,
    ) -> Result<QueryExecution, QthenaError> {
        let resp = self
            .athena_client
            .get_query_execution()
            .query_execution_id(query_id.as_str())
            .send()
            .await
            .map_err(|e| QthenaError::Backend(e.to_string()))?;

        let qe = resp
            .query_execution()
            .ok_or(QthenaError::MissingField("QueryExecution"))?;

        Ok(convert_execution(qe))
    }

    async fn get_query_results(
        &self,
        query_id: &QueryExecutionId,
        page: &PageRequest,
    ) -> Result<QueryResults, QthenaError> {
        let mut request = self
            .athena_client
            .get_query_results()
            .query_execution_id(query_id.as_str());
        if let Some(token) = &page.next_token {
            request = request.next_token(token);
        }
        if let Some(max) = page.max_results {
            request = request.max_results(max);
        }

        let output = request
            .send()
            .await
            .map_err(|e| QthenaError::Backend(e.to_string()))?;

        let result_set = output
            .result_set()
            .map(convert_result_set)
            .unwrap_or_default();

        debug!(
            query_id = %query_id,
            rows = result_set.rows.len(),
            has_next = output.next_token().is_some(),
            "Fetched result page"
        );

        Ok(QueryResults {
            result_set,
            next_token: output.next_token().map(str::to_string),
            update_count: output.update_count(),
        })
    }
}

// ---------------------------------------------------------------------------
// SDK → model conversion
// ---------------------------------------------------------------------------

fn convert_execution(qe: &aws_sdk_athena::types::QueryExecution) -> QueryExecution {
    QueryExecution {
        query_execution_id: qe.query_execution_id().map(str::to_string),
        query: qe.query().map(str::to_string),
        status: qe.status().map(|s| QueryExecutionStatus {
            state: s.state().map(|st| st.as_str().to_string()),
            state_change_reason: s.state_change_reason().map(str::to_string),
        }),
        statistics: qe.statistics().map(|s| QueryExecutionStatistics {
            engine_execution_time_in_millis: s.engine_execution_time_in_millis(),
            data_scanned_in_bytes: s.data_scanned_in_bytes(),
            total_execution_time_in_millis: s.total_execution_time_in_millis(),
        }),
        result_configuration: qe.result_configuration().map(|rc| ResultConfiguration {
            output_location: rc.output_location().map(str::to_string),
        }),
    }
}

fn convert_result_set(rs: &aws_sdk_athena::types::ResultSet) -> ResultSet {
    let column_info = rs
        .result_set_metadata()
        .map(|meta| {
            meta.column_info()
                .iter()
                .map(|ci| ColumnInfo {
                    name: ci.name().to_string(),
                    label: ci.label().map(str::to_string),
                    data_type: ci.r#type().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let rows = rs
        .rows()
        .iter()
        .map(|row| Row {
            data: row
                .data()
                .iter()
                .map(|datum| Datum {
                    var_char_value: datum.var_char_value().map(str::to_string),
                })
                .collect(),
        })
        .collect();

    ResultSet {
        rows,
        result_set_metadata: ResultSetMetadata { column_info },
    }
}
