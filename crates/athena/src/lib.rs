pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod fixture;
pub mod model;
pub mod normalize;
pub mod pages;

pub use backend::{AthenaBackend, SdkBackend};
pub use client::{QueryRunner, Selection};
pub use config::{BackendConfig, HeaderRow, MockMode, PollPolicy, QthenaConfig, DEFAULT_DATABASE};
pub use error::QthenaError;
pub use factory::ClientFactory;
pub use fixture::{FixtureStore, PlaybackBackend, RecordingBackend};
pub use model::{
    ColumnInfo, Datum, ExecutionRequest, ExecutionStatus, PageRequest, QueryExecution,
    QueryExecutionId, QueryResults, QueryState, ResultSet, Row,
};
pub use normalize::{result_set_to_records, results_to_records, Record, PLACEHOLDER};
pub use pages::ResultPages;
