//! Submit / poll / wait / fetch against recorded and scripted backends.

use std::sync::Arc;
use std::time::Duration;

use qthena::*;

use crate::support::{base_config, page, playback_runner, ScriptedBackend};

fn scripted_runner(backend: &Arc<ScriptedBackend>, config: QthenaConfig) -> QueryRunner {
    QueryRunner::with_backend(config, backend.clone()).expect("runner")
}

#[tokio::test]
async fn submit_returns_canonical_execution_id() {
    let runner = playback_runner("show_databases").await;

    let query_id = runner.submit("show databases").await.unwrap();

    assert_eq!(query_id.as_str().len(), 36);
    assert!(query_id.is_canonical());
}

#[tokio::test]
async fn create_database_always_targets_default_database() {
    let backend = ScriptedBackend::new(&["SUCCEEDED"]).into_arc();
    let config = QthenaConfig {
        database: "analytics".into(),
        ..base_config()
    };
    let runner = scripted_runner(&backend, config);

    runner.submit("CrEaTe DaTaBaSe sales").await.unwrap();
    assert_eq!(backend.last_request().database, "default");

    runner.submit("select * from orders").await.unwrap();
    let request = backend.last_request();
    assert_eq!(request.database, "analytics");
    assert_eq!(
        request.output_location,
        "s3://s3-sjd-illon-dev-us-west-2-data/awsathenadata/queryresults/"
    );
}

#[tokio::test]
async fn await_completion_true_after_running() {
    let runner = playback_runner("show_databases").await;
    let query_id = runner.submit("show databases").await.unwrap();

    assert!(runner.await_completion(&query_id).await.unwrap());
}

#[tokio::test]
async fn await_completion_false_on_failure() {
    let runner = playback_runner("failed_query").await;
    let query_id = runner.submit("select * from missing_table").await.unwrap();

    assert!(!runner.await_completion(&query_id).await.unwrap());

    let status = runner.poll(&query_id).await.unwrap();
    assert_eq!(status.status, QueryState::Failed);
    let reason = status.error.expect("failure reason");
    assert!(!reason.is_empty());
    assert!(reason.contains("missing_table"));
    assert_eq!(status.run_time_ms, None);
}

#[tokio::test]
async fn await_completion_false_on_other_terminal_states() {
    for state in ["CANCELLED", "PAUSED"] {
        let backend = ScriptedBackend::new(&["QUEUED", "RUNNING", state]).into_arc();
        let runner = scripted_runner(&backend, base_config());

        let done = runner.await_completion(&backend.query_id).await.unwrap();
        assert!(!done, "{state} should not count as success");
        assert_eq!(backend.poll_count(), 3);
    }
}

#[tokio::test]
async fn succeeded_status_has_metrics() {
    let runner = playback_runner("show_databases").await;
    let query_id = runner.submit("show databases").await.unwrap();

    let first = runner.poll(&query_id).await.unwrap();
    assert_eq!(first.status, QueryState::Running);
    assert_eq!(first.run_time_ms, None);

    let second = runner.poll(&query_id).await.unwrap();
    assert!(second.succeeded());
    assert_eq!(second.run_time_ms, Some(412));
    assert_eq!(second.bytes_scanned, Some(0));
    assert_eq!(second.error, None);
}

#[tokio::test]
async fn select_end_to_end_from_fixtures() {
    let runner = playback_runner("show_databases").await;

    let selection = runner.select("show databases", true).await.unwrap();
    let records = selection.records().expect("records");

    assert!(!records.is_empty());
    assert!(records.iter().all(|r| r.contains_key("database_name")));
    assert_eq!(records[0]["database_name"], "athena");
    assert_eq!(records[3]["database_name"], PLACEHOLDER);
}

#[tokio::test]
async fn select_raw_returns_result_set() {
    let runner = playback_runner("show_databases").await;

    let selection = runner.select("show databases", false).await.unwrap();
    let raw = selection.raw().expect("raw result set");

    assert_eq!(raw.result_set.labels(), vec!["database_name"]);
    assert_eq!(raw.result_set.row_count(), 4);
}

#[tokio::test]
async fn select_records_matches_select() {
    let records = playback_runner("show_databases")
        .await
        .select_records("show databases")
        .await
        .unwrap();
    let selection = playback_runner("show_databases")
        .await
        .select("show databases", true)
        .await
        .unwrap();

    assert_eq!(Selection::Records(records), selection);
}

#[tokio::test]
async fn run_ddl_returns_final_status() {
    let runner = playback_runner("show_databases").await;

    let status = runner.run_ddl("create database if not exists sales").await.unwrap();

    assert!(status.succeeded());
    assert_eq!(status.run_time_ms, Some(412));
}

#[tokio::test]
async fn run_ddl_reports_failure_as_status() {
    let runner = playback_runner("failed_query").await;

    let status = runner.run_ddl("drop table missing_table").await.unwrap();

    assert_eq!(status.status, QueryState::Failed);
    assert!(status.error.is_some());
}

#[tokio::test]
async fn run_and_fetch_still_fetches_after_failure() {
    let backend = ScriptedBackend::new(&["RUNNING", "FAILED"]).into_arc();
    let runner = scripted_runner(&backend, base_config());

    let results = runner.run_and_fetch("select 1").await.unwrap();

    assert_eq!(results.result_set.row_count(), 1);
    assert_eq!(backend.page_requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn max_polls_bounds_the_wait() {
    let backend = ScriptedBackend::new(&["RUNNING"]).into_arc();
    let config = QthenaConfig {
        poll: PollPolicy::every(Duration::ZERO).with_max_polls(3),
        ..base_config()
    };
    let runner = scripted_runner(&backend, config);

    let err = runner.await_completion(&backend.query_id).await.unwrap_err();

    match err {
        QthenaError::WaitTimeout { query_id, polls, .. } => {
            assert_eq!(query_id, backend.query_id.as_str());
            assert_eq!(polls, 3);
        }
        other => panic!("expected WaitTimeout, got {other:?}"),
    }
    assert_eq!(backend.poll_count(), 3);
}

#[tokio::test]
async fn max_wait_bounds_the_wait() {
    let backend = ScriptedBackend::new(&["QUEUED"]).into_arc();
    let config = QthenaConfig {
        poll: PollPolicy::every(Duration::from_millis(5)).with_max_wait(Duration::from_millis(30)),
        ..base_config()
    };
    let runner = scripted_runner(&backend, config);

    let err = runner.await_completion(&backend.query_id).await.unwrap_err();

    assert!(matches!(err, QthenaError::WaitTimeout { .. }));
    assert!(backend.poll_count() >= 2);
}

#[tokio::test]
async fn long_interval_does_not_overshoot_max_wait() {
    let backend = ScriptedBackend::new(&["RUNNING"]).into_arc();
    let config = QthenaConfig {
        poll: PollPolicy::every(Duration::from_secs(30)).with_max_wait(Duration::from_millis(50)),
        ..base_config()
    };
    let runner = scripted_runner(&backend, config);
    let started = std::time::Instant::now();

    let err = runner.await_completion(&backend.query_id).await.unwrap_err();

    assert!(matches!(err, QthenaError::WaitTimeout { polls: 2, .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn backend_errors_propagate_unchanged() {
    let backend = ScriptedBackend::new(&["SUCCEEDED"])
        .failing_start("ThrottlingException: Rate exceeded")
        .into_arc();
    let runner = scripted_runner(&backend, base_config());

    let err = runner.run_and_fetch("select 1").await.unwrap_err();

    match err {
        QthenaError::Backend(msg) => assert_eq!(msg, "ThrottlingException: Rate exceeded"),
        other => panic!("expected backend error, got {other:?}"),
    }
    assert_eq!(backend.poll_count(), 0);
}

#[tokio::test]
async fn run_and_fetch_reads_first_page_only_by_default() {
    let runner = playback_runner("paged_results").await;

    let results = runner.run_and_fetch("select id, name from users").await.unwrap();

    assert_eq!(results.result_set.row_count(), 3);
    assert!(results.next_token.is_some());
}

#[tokio::test]
async fn follow_pages_reads_every_page() {
    let backend = ScriptedBackend::new(&["SUCCEEDED"])
        .with_pages(vec![
            page(&["n"], &[&["1"], &["2"]], Some("page-1")),
            page(&["n"], &[&["3"]], Some("page-2")),
            page(&["n"], &[&["4"]], None),
        ])
        .into_arc();
    let config = QthenaConfig {
        follow_pages: true,
        ..base_config()
    };
    let runner = scripted_runner(&backend, config);

    let records = runner.select_records("select n from numbers").await.unwrap();

    let values: Vec<&str> = records.iter().map(|r| r["n"].as_str()).collect();
    assert_eq!(values, vec!["1", "2", "3", "4"]);
    assert_eq!(backend.page_requests.lock().unwrap().len(), 3);
}
