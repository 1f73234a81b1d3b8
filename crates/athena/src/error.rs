use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the query runner, the backends and the fixture store.
///
/// A query that ends in `FAILED` is not an error: it comes back as an
/// [`ExecutionStatus`](crate::model::ExecutionStatus) with a reason.
#[derive(Debug, Error)]
pub enum QthenaError {
    /// Missing or invalid configuration, reported at construction time.
    #[error("configuration error: {0}")]
    Config(String),

    /// An AWS SDK error (stringified), passed through without retry.
    #[error("AWS SDK error: {0}")]
    Backend(String),

    /// The backend response lacked a field every response should carry.
    #[error("response is missing {0}")]
    MissingField(&'static str),

    /// A fixture file could not be read, written or decoded.
    #[error("fixture {path}: {reason}")]
    Fixture { path: PathBuf, reason: String },

    /// The poll policy ran out before the query reached a terminal state.
    #[error("query {query_id} still not finished after {polls} polls ({elapsed_ms}ms)")]
    WaitTimeout {
        query_id: String,
        polls: u32,
        elapsed_ms: u64,
    },
}

impl QthenaError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn fixture(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Fixture {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
