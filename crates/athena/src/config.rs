use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::QthenaError;

/// Database used when none is configured, and for every `CREATE DATABASE`.
pub const DEFAULT_DATABASE: &str = "default";

/// The only backend service this crate knows how to drive.
pub const ATHENA_SERVICE: &str = "athena";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

// ── Env helpers ─────────────────────────────────────────────────

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries `{PROFILE}_{KEY}` first, falls back to `{KEY}`.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T>(profile: &str, key: &str) -> Result<Option<T>, QthenaError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match profiled_env_opt(profile, key) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|e| QthenaError::config(format!("{key}={v:?}: {e}"))),
        None => Ok(None),
    }
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.as_str(), "true" | "1"),
        None => default,
    }
}

// ── Enumerated settings ─────────────────────────────────────────

/// Fixture mode for the backend: replay recorded calls or record live ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockMode {
    Playback,
    Record,
}

impl FromStr for MockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "playback" => Ok(MockMode::Playback),
            "record" => Ok(MockMode::Record),
            other => Err(format!(
                "unknown mock mode {other:?} (expected \"playback\" or \"record\")"
            )),
        }
    }
}

impl fmt::Display for MockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockMode::Playback => f.write_str("playback"),
            MockMode::Record => f.write_str("record"),
        }
    }
}

/// What the normalizer does with a leading header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderRow {
    /// Treat every row as data, header echo included.
    #[default]
    Keep,
    /// Drop the first row when it just repeats the column labels.
    Strip,
}

impl FromStr for HeaderRow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keep" => Ok(HeaderRow::Keep),
            "strip" => Ok(HeaderRow::Strip),
            other => Err(format!(
                "unknown header row mode {other:?} (expected \"keep\" or \"strip\")"
            )),
        }
    }
}

/// How long and how often to poll a query before giving up.
///
/// With neither bound set the runner polls until the query reaches a
/// terminal state, however long that takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Sleep between two polls of a QUEUED or RUNNING query.
    pub interval: Duration,
    /// Give up after this many polls.
    #[serde(default)]
    pub max_polls: Option<u32>,
    /// Give up once this much time has passed since the first poll.
    #[serde(default)]
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_polls: None,
            max_wait: None,
        }
    }
}

impl PollPolicy {
    /// Poll forever with the given interval.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// `true` once either bound has been reached.
    pub fn exhausted(&self, polls: u32, elapsed: Duration) -> bool {
        self.max_polls.is_some_and(|max| polls >= max)
            || self.max_wait.is_some_and(|max| elapsed >= max)
    }

    /// Sleep before the next poll, never past `max_wait`.
    pub fn next_sleep(&self, elapsed: Duration) -> Duration {
        match self.max_wait {
            Some(max) => self.interval.min(max.saturating_sub(elapsed)),
            None => self.interval,
        }
    }
}

// ── Backend config ──────────────────────────────────────────────

/// Input of the [`ClientFactory`](crate::factory::ClientFactory).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Service to talk to (only `athena` is supported).
    pub service: String,
    /// AWS region.
    pub region: String,
    /// Named AWS credentials profile; `None` uses the default chain.
    #[serde(default)]
    pub aws_profile: Option<String>,
    #[serde(default)]
    pub mock_mode: Option<MockMode>,
    /// Directory holding fixture files for playback/record.
    #[serde(default)]
    pub mock_data_path: Option<PathBuf>,
}

impl BackendConfig {
    pub fn validate(&self) -> Result<(), QthenaError> {
        if self.service.trim().is_empty() {
            return Err(QthenaError::config("service is required"));
        }
        if self.region.trim().is_empty() {
            return Err(QthenaError::config("region is required"));
        }
        if self.service != ATHENA_SERVICE {
            return Err(QthenaError::config(format!(
                "unsupported service {:?}",
                self.service
            )));
        }
        if self.mock_mode.is_some() && self.mock_data_path.is_none() {
            return Err(QthenaError::config("mock mode requires a mock data path"));
        }
        Ok(())
    }
}

// ── QthenaConfig ────────────────────────────────────────────────

/// Everything a [`QueryRunner`](crate::client::QueryRunner) needs.
///
/// Reads from environment variables with optional profile prefix.
/// When `QTHENA_PROFILE=PROD`, checks `PROD_ATHENA_BUCKET` before `ATHENA_BUCKET`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QthenaConfig {
    /// AWS region for Athena queries.
    pub region: String,
    /// S3 bucket Athena writes results into.
    pub bucket: String,
    /// Key prefix under `bucket` for results.
    pub results_path: String,
    /// Athena database name.
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub poll: PollPolicy,
    /// Log raw backend payloads at `info` instead of `debug`.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub aws_profile: Option<String>,
    #[serde(default)]
    pub mock_mode: Option<MockMode>,
    #[serde(default)]
    pub mock_data_path: Option<PathBuf>,
    #[serde(default)]
    pub header_row: HeaderRow,
    /// Make `run_and_fetch` follow every result page, not just the first.
    #[serde(default)]
    pub follow_pages: bool,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

impl Default for QthenaConfig {
    fn default() -> Self {
        Self {
            region: String::new(),
            bucket: String::new(),
            results_path: String::new(),
            database: default_database(),
            poll: PollPolicy::default(),
            debug: false,
            aws_profile: None,
            mock_mode: None,
            mock_data_path: None,
            header_row: HeaderRow::Keep,
            follow_pages: false,
        }
    }
}

impl QthenaConfig {
    /// Build config from environment variables.
    ///
    /// Reads `QTHENA_PROFILE` to determine the profile prefix.
    pub fn from_env() -> Result<Self, QthenaError> {
        let profile = env_opt("QTHENA_PROFILE")
            .map(|s| s.to_uppercase())
            .unwrap_or_default();
        Self::from_env_profiled(&profile)
    }

    /// Build config for a specific named profile.
    ///
    /// `ATHENA_REGION` falls back to `AWS_REGION`. Values that do not parse are
    /// errors rather than silently replaced by defaults.
    pub fn from_env_profiled(profile: &str) -> Result<Self, QthenaError> {
        let region = profiled_env_opt(profile, "ATHENA_REGION")
            .or_else(|| profiled_env_opt(profile, "AWS_REGION"))
            .unwrap_or_default();

        let mut poll = PollPolicy::default();
        if let Some(secs) = profiled_env_parse::<f64>(profile, "ATHENA_SLEEP_SECONDS")? {
            poll.interval = seconds(secs, "ATHENA_SLEEP_SECONDS")?;
        }
        poll.max_polls = profiled_env_parse(profile, "ATHENA_MAX_POLLS")?;
        if let Some(secs) = profiled_env_parse::<f64>(profile, "ATHENA_MAX_WAIT_SECONDS")? {
            poll.max_wait = Some(seconds(secs, "ATHENA_MAX_WAIT_SECONDS")?);
        }

        Ok(Self {
            region,
            bucket: profiled_env_or(profile, "ATHENA_BUCKET", ""),
            results_path: profiled_env_or(profile, "ATHENA_RESULTS_PATH", ""),
            database: profiled_env_or(profile, "ATHENA_DATABASE", DEFAULT_DATABASE),
            poll,
            debug: profiled_env_bool(profile, "ATHENA_DEBUG", false),
            aws_profile: profiled_env_opt(profile, "ATHENA_AWS_PROFILE"),
            mock_mode: profiled_env_parse(profile, "ATHENA_MOCK_MODE")?,
            mock_data_path: profiled_env_opt(profile, "ATHENA_MOCK_DATA_PATH").map(PathBuf::from),
            header_row: profiled_env_parse(profile, "ATHENA_HEADER_ROW")?.unwrap_or_default(),
            follow_pages: profiled_env_bool(profile, "ATHENA_FOLLOW_PAGES", false),
        })
    }

    pub fn validate(&self) -> Result<(), QthenaError> {
        if self.region.trim().is_empty() {
            return Err(QthenaError::config("region is required"));
        }
        if self.bucket.trim().is_empty() {
            return Err(QthenaError::config("bucket is required"));
        }
        if self.results_path.trim().is_empty() {
            return Err(QthenaError::config("results path is required"));
        }
        Ok(())
    }

    /// `s3://<bucket>/<results_path>/`
    pub fn output_location(&self) -> String {
        format!(
            "s3://{}/{}/",
            self.bucket.trim_matches('/'),
            self.results_path.trim_matches('/')
        )
    }

    /// Database to use when nothing was configured.
    pub fn database_or_default(&self) -> &str {
        if self.database.trim().is_empty() {
            DEFAULT_DATABASE
        } else {
            &self.database
        }
    }

    /// Factory input for the Athena backend.
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            service: ATHENA_SERVICE.to_string(),
            region: self.region.clone(),
            aws_profile: self.aws_profile.clone(),
            mock_mode: self.mock_mode,
            mock_data_path: self.mock_data_path.clone(),
        }
    }
}

fn seconds(secs: f64, key: &str) -> Result<Duration, QthenaError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| QthenaError::config(format!("{key}: {secs} is not a valid number of seconds")))
}

// ── Tests ────────────────────────────────────────────────────────
