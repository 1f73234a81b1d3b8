//! Record mode writes fixtures that playback mode can replay.

use std::sync::Arc;

use qthena::*;

use crate::support::{base_config, ScriptedBackend};

#[tokio::test]
async fn recorded_calls_replay_identically() {
    let dir = tempfile::tempdir().unwrap();

    let live = ScriptedBackend::new(&["QUEUED", "RUNNING", "SUCCEEDED"]).into_arc();
    let recording = RecordingBackend::new(live.clone(), FixtureStore::new(dir.path(), "athena"));
    let runner = QueryRunner::with_backend(base_config(), Arc::new(recording)).unwrap();
    let recorded = runner.select("show databases", true).await.unwrap();

    for name in [
        "athena.StartQueryExecution_1.json",
        "athena.GetQueryExecution_1.json",
        "athena.GetQueryExecution_3.json",
        "athena.GetQueryResults_1.json",
    ] {
        assert!(dir.path().join(name).exists(), "{name} was not written");
    }
    assert!(!dir.path().join("athena.GetQueryExecution_4.json").exists());

    let config = QthenaConfig {
        mock_mode: Some(MockMode::Playback),
        mock_data_path: Some(dir.path().to_path_buf()),
        ..base_config()
    };
    let replayed = QueryRunner::new(config)
        .await
        .unwrap()
        .select("show databases", true)
        .await
        .unwrap();

    assert_eq!(recorded, replayed);
    assert_eq!(live.poll_count(), 3);
}

#[tokio::test]
async fn recorded_fixture_uses_service_field_names() {
    let dir = tempfile::tempdir().unwrap();
    let live = ScriptedBackend::new(&["SUCCEEDED"]).into_arc();
    let recording = RecordingBackend::new(live.clone(), FixtureStore::new(dir.path(), "athena"));

    let id = recording
        .start_query_execution(&ExecutionRequest {
            query_string: "show databases".into(),
            database: "default".into(),
            output_location: "s3://bucket/path/".into(),
        })
        .await
        .unwrap();

    let body = std::fs::read_to_string(dir.path().join("athena.StartQueryExecution_1.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status_code"], 200);
    assert_eq!(json["data"]["QueryExecutionId"], id.as_str());
}

#[tokio::test]
async fn failed_live_calls_replay_as_backend_errors() {
    let dir = tempfile::tempdir().unwrap();
    let live = ScriptedBackend::new(&["SUCCEEDED"])
        .failing_start("AccessDeniedException: not authorized")
        .into_arc();
    let recording = RecordingBackend::new(live, FixtureStore::new(dir.path(), "athena"));
    let runner = QueryRunner::with_backend(base_config(), Arc::new(recording)).unwrap();

    let live_err = runner.submit("show databases").await.unwrap_err();

    let body = std::fs::read_to_string(dir.path().join("athena.StartQueryExecution_1.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status_code"], 400);
    assert_eq!(json["data"]["Error"]["Message"], "AccessDeniedException: not authorized");

    let config = QthenaConfig {
        mock_mode: Some(MockMode::Playback),
        mock_data_path: Some(dir.path().to_path_buf()),
        ..base_config()
    };
    let replay_err = QueryRunner::new(config)
        .await
        .unwrap()
        .submit("show databases")
        .await
        .unwrap_err();

    match (&live_err, &replay_err) {
        (QthenaError::Backend(live), QthenaError::Backend(replayed)) => assert_eq!(live, replayed),
        other => panic!("expected backend errors on both sides, got {other:?}"),
    }
}

#[tokio::test]
async fn playback_from_missing_directory_fails_on_first_call() {
    let config = QthenaConfig {
        mock_mode: Some(MockMode::Playback),
        mock_data_path: Some("/nonexistent/qthena/mock_data".into()),
        ..base_config()
    };
    let runner = QueryRunner::new(config).await.unwrap();

    let err = runner.submit("show databases").await.unwrap_err();
    assert!(matches!(err, QthenaError::Fixture { .. }));
}
