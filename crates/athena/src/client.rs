//! Query lifecycle on top of an [`AthenaBackend`].
//!
//! [`QueryRunner`] submits a query, polls it until it reaches a terminal
//! state, fetches the results and optionally reshapes them into records.
//! Backend errors are never retried; a query that ends in `FAILED` is
//! reported through the returned status rather than as an error.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::backend::AthenaBackend;
use crate::config::{QthenaConfig, DEFAULT_DATABASE};
use crate::error::QthenaError;
use crate::factory::ClientFactory;
use crate::model::{
    ExecutionRequest, ExecutionStatus, PageRequest, QueryExecutionId, QueryResults, QueryState,
};
use crate::normalize::{results_to_records, Record};
use crate::pages::ResultPages;

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// What [`QueryRunner::select`] hands back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Selection {
    Raw(QueryResults),
    Records(Vec<Record>),
}

impl Selection {
    pub fn records(&self) -> Option<&[Record]> {
        match self {
            Selection::Records(records) => Some(records),
            Selection::Raw(_) => None,
        }
    }

    pub fn raw(&self) -> Option<&QueryResults> {
        match self {
            Selection::Raw(results) => Some(results),
            Selection::Records(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runs queries against one database and output location.
///
/// Each runner owns its configuration and backend handle; nothing is shared
/// between runners and nothing is cached between calls.
pub struct QueryRunner {
    config: QthenaConfig,
    backend: Arc<dyn AthenaBackend>,
    output_location: String,
}

impl fmt::Debug for QueryRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRunner")
            .field("config", &self.config)
            .field("output_location", &self.output_location)
            .finish_non_exhaustive()
    }
}

impl QueryRunner {
    /// Validate `config` and build the backend through the [`ClientFactory`].
    pub async fn new(config: QthenaConfig) -> Result<Self, QthenaError> {
        config.validate()?;
        let backend = ClientFactory::new(config.backend_config())?.build().await?;
        Self::with_backend(config, backend)
    }

    /// Use an already-built backend.
    pub fn with_backend(
        config: QthenaConfig,
        backend: Arc<dyn AthenaBackend>,
    ) -> Result<Self, QthenaError> {
        config.validate()?;
        let output_location = config.output_location();

        info!(
            region = %config.region,
            database = %config.database_or_default(),
            output_location = %output_location,
            poll_interval_ms = config.poll.interval.as_millis() as u64,
            "QueryRunner initialised"
        );

        Ok(Self {
            config,
            backend,
            output_location,
        })
    }

    pub fn config(&self) -> &QthenaConfig {
        &self.config
    }

    /// `s3://<bucket>/<results_path>/` that every query writes to.
    pub fn output_location(&self) -> &str {
        &self.output_location
    }

    /// Database a query will run in.
    ///
    /// Any query containing `create database` (case-insensitive) goes to the
    /// default database whatever was configured.
    pub fn database_for(&self, query: &str) -> &str {
        if query.to_lowercase().contains("create database") {
            DEFAULT_DATABASE
        } else {
            self.config.database_or_default()
        }
    }

    /// The request [`submit`](Self::submit) sends for `query`.
    pub fn execution_request(&self, query: &str) -> ExecutionRequest {
        ExecutionRequest {
            query_string: query.to_string(),
            database: self.database_for(query).to_string(),
            output_location: self.output_location.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Single calls
    // -----------------------------------------------------------------------

    /// Start `query` and return its execution id.
    pub async fn submit(&self, query: &str) -> Result<QueryExecutionId, QthenaError> {
        let request = self.execution_request(query);
        let query_id = self.backend.start_query_execution(&request).await?;

        info!(
            query_id = %query_id,
            database = %request.database,
            query = %query,
            "Query execution started"
        );

        Ok(query_id)
    }

    /// Fetch the current status of an execution.
    pub async fn poll(&self, query_id: &QueryExecutionId) -> Result<ExecutionStatus, QthenaError> {
        let qe = self.backend.get_query_execution(query_id).await?;
        let status = ExecutionStatus::from_execution(&qe);
        self.log_payload("status", query_id, &status);
        Ok(status)
    }

    /// Fetch the first page of results only.
    ///
    /// Larger result sets are truncated to whatever the service puts in one
    /// page; use [`fetch_all_results`](Self::fetch_all_results) or
    /// [`result_pages`](Self::result_pages) to read everything.
    pub async fn fetch_results(
        &self,
        query_id: &QueryExecutionId,
    ) -> Result<QueryResults, QthenaError> {
        let results = self
            .backend
            .get_query_results(query_id, &PageRequest::first())
            .await?;
        self.log_payload("results", query_id, &results);
        Ok(results)
    }

    /// Lazy pager over every result page of `query_id`.
    pub fn result_pages(&self, query_id: &QueryExecutionId) -> ResultPages {
        ResultPages::new(Arc::clone(&self.backend), query_id.clone())
    }

    /// Fetch and concatenate every result page.
    pub async fn fetch_all_results(
        &self,
        query_id: &QueryExecutionId,
    ) -> Result<QueryResults, QthenaError> {
        let results = self.result_pages(query_id).collect_all().await?;
        self.log_payload("results", query_id, &results);
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Waiting
    // -----------------------------------------------------------------------

    /// Poll until the execution reaches a terminal state.
    ///
    /// Returns `true` for SUCCEEDED and `false` for FAILED (reason logged at
    /// error level) or any other terminal state. QUEUED and RUNNING sleep for
    /// the configured interval and poll again. With no `max_polls`/`max_wait`
    /// in the poll policy this never gives up; with one, running out of it
    /// yields [`QthenaError::WaitTimeout`].
    pub async fn await_completion(
        &self,
        query_id: &QueryExecutionId,
    ) -> Result<bool, QthenaError> {
        let policy = self.config.poll;
        let start = Instant::now();
        let mut polls: u32 = 0;

        loop {
            let status = self.poll(query_id).await?;
            polls += 1;

            info!(query_id = %query_id, state = %status.status, "Query status");

            match &status.status {
                QueryState::Succeeded => return Ok(true),
                QueryState::Failed => {
                    error!(
                        query_id = %query_id,
                        reason = status.error.as_deref().unwrap_or("unknown"),
                        "Query failed"
                    );
                    return Ok(false);
                }
                other if other.is_terminal() => {
                    warn!(query_id = %query_id, state = %other, "Query ended without succeeding");
                    return Ok(false);
                }
                _ => {}
            }

            let elapsed = start.elapsed();
            if policy.exhausted(polls, elapsed) {
                warn!(
                    query_id = %query_id,
                    polls,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Gave up waiting for query"
                );
                return Err(QthenaError::WaitTimeout {
                    query_id: query_id.to_string(),
                    polls,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }

            let sleep_for = policy.next_sleep(elapsed);
            debug!(
                query_id = %query_id,
                sleep_ms = sleep_for.as_millis() as u64,
                "Sleeping before next poll"
            );
            tokio::time::sleep(sleep_for).await;
        }
    }

    // -----------------------------------------------------------------------
    // Compositions
    // -----------------------------------------------------------------------

    /// Submit, wait, fetch.
    ///
    /// The fetch happens even when the wait reports failure, so the caller
    /// gets whatever the service returns for a failed execution; check the
    /// status separately when that matters. Follows every page only when
    /// `follow_pages` is configured.
    pub async fn run_and_fetch(&self, query: &str) -> Result<QueryResults, QthenaError> {
        let query_id = self.submit(query).await?;
        if !self.await_completion(&query_id).await? {
            warn!(query_id = %query_id, "Fetching results of a query that did not succeed");
        }

        if self.config.follow_pages {
            self.fetch_all_results(&query_id).await
        } else {
            self.fetch_results(&query_id).await
        }
    }

    /// Submit, wait, and return the final status. For statements without rows.
    pub async fn run_ddl(&self, query: &str) -> Result<ExecutionStatus, QthenaError> {
        let query_id = self.submit(query).await?;
        self.await_completion(&query_id).await?;
        let status = self.poll(&query_id).await?;
        info!(query_id = %query_id, state = %status.status, "Statement finished");
        Ok(status)
    }

    /// [`run_and_fetch`](Self::run_and_fetch), optionally reshaped into records.
    pub async fn select(&self, query: &str, as_records: bool) -> Result<Selection, QthenaError> {
        let results = self.run_and_fetch(query).await?;
        if as_records {
            Ok(Selection::Records(results_to_records(&results, self.config.header_row)))
        } else {
            Ok(Selection::Raw(results))
        }
    }

    /// [`select`](Self::select) with records.
    pub async fn select_records(&self, query: &str) -> Result<Vec<Record>, QthenaError> {
        let results = self.run_and_fetch(query).await?;
        Ok(results_to_records(&results, self.config.header_row))
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Raw payloads go to `info` when this runner has `debug` on, else `debug`.
    fn log_payload<T: fmt::Debug>(&self, kind: &str, query_id: &QueryExecutionId, payload: &T) {
        if self.config.debug {
            info!(query_id = %query_id, kind, payload = ?payload, "Backend payload");
        } else {
            debug!(query_id = %query_id, kind, payload = ?payload, "Backend payload");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests: routing and request shape only, no backend calls
// ---------------------------------------------------------------------------
