//! Record and replay backend calls as JSON files.
//!
//! Each call is one file named `<service>.<Operation>_<n>.json`, numbered per
//! operation from 1, holding `{"status_code": ..., "data": ...}` where `data`
//! is the response body in the service's own field names. On playback a
//! missing file `n > 1` wraps the counter back to 1, so one recording can be
//! replayed any number of times.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::AthenaBackend;
use crate::error::QthenaError;
use crate::model::{
    ExecutionRequest, GetQueryExecutionOutput, PageRequest, QueryExecution, QueryExecutionId,
    QueryResults, StartQueryExecutionOutput,
};

const START_QUERY_EXECUTION: &str = "StartQueryExecution";
const GET_QUERY_EXECUTION: &str = "GetQueryExecution";
const GET_QUERY_RESULTS: &str = "GetQueryResults";

const STATUS_OK: u16 = 200;
const STATUS_FAILED: u16 = 400;

/// On-disk envelope of one recorded call.
#[derive(Debug, Serialize, Deserialize)]
struct FixtureEnvelope<T> {
    status_code: u16,
    data: T,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// A directory of fixture files plus the per-operation call counters.
#[derive(Debug)]
pub struct FixtureStore {
    root: PathBuf,
    service: String,
    counters: Mutex<HashMap<&'static str, u32>>,
}

impl FixtureStore {
    pub fn new(root: impl Into<PathBuf>, service: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            service: service.into(),
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the `index`-th recorded call of `operation`.
    pub fn path_for(&self, operation: &str, index: u32) -> PathBuf {
        self.root
            .join(format!("{}.{}_{}.json", self.service, operation, index))
    }

    fn next_index(&self, operation: &'static str) -> u32 {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let n = counters.entry(operation).or_insert(0);
        *n += 1;
        *n
    }

    fn reset_index(&self, operation: &'static str, index: u32) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.insert(operation, index);
    }

    /// Load the next recorded response for `operation`.
    async fn load<T: DeserializeOwned>(&self, operation: &'static str) -> Result<T, QthenaError> {
        let mut index = self.next_index(operation);
        let mut path = self.path_for(operation, index);

        if index > 1 && !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            index = 1;
            self.reset_index(operation, index);
            path = self.path_for(operation, index);
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| QthenaError::fixture(&path, e))?;
        let envelope: FixtureEnvelope<serde_json::Value> =
            serde_json::from_slice(&bytes).map_err(|e| QthenaError::fixture(&path, e))?;

        debug!(path = %path.display(), status_code = envelope.status_code, "Replaying recorded call");

        if !(200..300).contains(&envelope.status_code) {
            let message = match envelope.data.pointer("/Error/Message") {
                Some(serde_json::Value::String(message)) => message.clone(),
                _ => format!(
                    "recorded {} call returned status {}: {}",
                    operation, envelope.status_code, envelope.data
                ),
            };
            return Err(QthenaError::Backend(message));
        }

        serde_json::from_value(envelope.data).map_err(|e| QthenaError::fixture(&path, e))
    }

    /// Write `data` as the next recorded response for `operation`.
    async fn save<T: Serialize>(
        &self,
        operation: &'static str,
        status_code: u16,
        data: &T,
    ) -> Result<(), QthenaError> {
        let index = self.next_index(operation);
        let path = self.path_for(operation, index);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| QthenaError::fixture(&self.root, e))?;

        let envelope = FixtureEnvelope { status_code, data };
        let json =
            serde_json::to_vec_pretty(&envelope).map_err(|e| QthenaError::fixture(&path, e))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| QthenaError::fixture(&path, e))?;

        debug!(path = %path.display(), status_code, "Recorded call");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

/// Serves every call from a [`FixtureStore`]; never touches the network.
#[derive(Debug)]
pub struct PlaybackBackend {
    store: FixtureStore,
}

impl PlaybackBackend {
    pub fn new(store: FixtureStore) -> Self {
        info!(path = %store.root().display(), "Playing back recorded Athena calls");
        Self { store }
    }
}

#[async_trait]
impl AthenaBackend for PlaybackBackend {
    async fn start_query_execution(
        &self,
        _request: &ExecutionRequest,
    ) -> Result<QueryExecutionId, QthenaError> {
        let out: StartQueryExecutionOutput = self.store.load(START_QUERY_EXECUTION).await?;
        Ok(out.query_execution_id)
    }

    async fn get_query_execution(
        &self,
        _query_id: &QueryExecutionId,
    ) -> Result<QueryExecution, QthenaError> {
        let out: GetQueryExecutionOutput = self.store.load(GET_QUERY_EXECUTION).await?;
        Ok(out.query_execution)
    }

    async fn get_query_results(
        &self,
        _query_id: &QueryExecutionId,
        _page: &PageRequest,
    ) -> Result<QueryResults, QthenaError> {
        self.store.load(GET_QUERY_RESULTS).await
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Forwards every call to an inner backend and writes each response to a
/// [`FixtureStore`]. A backend failure is recorded as a `400` envelope carrying
/// the error message, then passed through.
pub struct RecordingBackend {
    inner: Arc<dyn AthenaBackend>,
    store: FixtureStore,
}

impl RecordingBackend {
    pub fn new(inner: Arc<dyn AthenaBackend>, store: FixtureStore) -> Self {
        info!(path = %store.root().display(), "Recording Athena calls");
        Self { inner, store }
    }

    async fn record<T: Serialize>(
        &self,
        operation: &'static str,
        result: &Result<T, QthenaError>,
    ) -> Result<(), QthenaError> {
        match result {
            Ok(data) => self.store.save(operation, STATUS_OK, data).await,
            Err(QthenaError::Backend(message)) => {
                let data = serde_json::json!({ "Error": { "Message": message } });
                self.store.save(operation, STATUS_FAILED, &data).await
            }
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl AthenaBackend for RecordingBackend {
    async fn start_query_execution(
        &self,
        request: &ExecutionRequest,
    ) -> Result<QueryExecutionId, QthenaError> {
        let result = self
            .inner
            .start_query_execution(request)
            .await
            .map(|query_execution_id| StartQueryExecutionOutput { query_execution_id });
        self.record(START_QUERY_EXECUTION, &result).await?;
        result.map(|out| out.query_execution_id)
    }

    async fn get_query_execution(
        &self,
        query_id: &QueryExecutionId,
    ) -> Result<QueryExecution, QthenaError> {
        let result = self
            .inner
            .get_query_execution(query_id)
            .await
            .map(|query_execution| GetQueryExecutionOutput { query_execution });
        self.record(GET_QUERY_EXECUTION, &result).await?;
        result.map(|out| out.query_execution)
    }

    async fn get_query_results(
        &self,
        query_id: &QueryExecutionId,
        page: &PageRequest,
    ) -> Result<QueryResults, QthenaError> {
        let result = self.inner.get_query_results(query_id, page).await;
        self.record(GET_QUERY_RESULTS, &result).await?;
        result
    }
}
