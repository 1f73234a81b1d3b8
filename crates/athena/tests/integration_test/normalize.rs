//! Result normalization on service-shaped JSON.

use qthena::*;

use crate::support::playback_runner;

fn results(json: &str) -> QueryResults {
    serde_json::from_str(json).expect("valid results json")
}

#[test]
fn single_row_result_becomes_one_record() {
    let results = results(
        r#"{
            "ResultSet": {
                "Rows": [{"Data": [{"VarCharValue": "athena"}]}],
                "ResultSetMetadata": {"ColumnInfo": [{
                    "CatalogName": "hive", "SchemaName": "", "TableName": "",
                    "Name": "database_name", "Label": "database_name",
                    "Type": "string", "Precision": 0, "Scale": 0,
                    "Nullable": "UNKNOWN", "CaseSensitive": false
                }]}
            }
        }"#,
    );

    let records = results_to_records(&results, HeaderRow::Keep);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("database_name").map(String::as_str), Some("athena"));
}

#[test]
fn missing_and_foreign_cells() {
    let results = results(
        r#"{
            "ResultSet": {
                "Rows": [
                    {"Data": [{"VarCharValue": "1"}, {}, {"SomethingElse": "x"}]},
                    {"Data": []}
                ],
                "ResultSetMetadata": {"ColumnInfo": [
                    {"Name": "id", "Type": "bigint"},
                    {"Name": "name", "Type": "varchar"},
                    {"Name": "note", "Type": "varchar"}
                ]}
            }
        }"#,
    );

    let records = results_to_records(&results, HeaderRow::Keep);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"], "1");
    assert_eq!(records[0]["name"], PLACEHOLDER);
    assert_eq!(records[0]["note"], "x");
    assert!(records[1].is_empty());
}

#[test]
fn wrong_typed_cells_get_placeholder() {
    let results = results(
        r#"{
            "ResultSet": {
                "Rows": [
                    {"Data": [{"VarCharValue": 5}, {"VarCharValue": {"nested": true}}, "bare"]},
                    {"Data": null}
                ],
                "ResultSetMetadata": {"ColumnInfo": [
                    {"Name": "id", "Type": "bigint"},
                    {"Name": "name", "Type": "varchar"},
                    {"Name": "note", "Type": "varchar"}
                ]}
            }
        }"#,
    );

    let records = results_to_records(&results, HeaderRow::Keep);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"], PLACEHOLDER);
    assert_eq!(records[0]["name"], PLACEHOLDER);
    assert_eq!(records[0]["note"], PLACEHOLDER);
    assert!(records[1].is_empty());
}

#[test]
fn header_echo_handling() {
    let results = results(
        r#"{
            "ResultSet": {
                "Rows": [
                    {"Data": [{"VarCharValue": "day"}, {"VarCharValue": "error_count"}]},
                    {"Data": [{"VarCharValue": "2024-10-01"}, {"VarCharValue": "17"}]}
                ],
                "ResultSetMetadata": {"ColumnInfo": [
                    {"Name": "day", "Label": "day", "Type": "date"},
                    {"Name": "error_count", "Label": "error_count", "Type": "bigint"}
                ]}
            }
        }"#,
    );

    let kept = results_to_records(&results, HeaderRow::Keep);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0]["day"], "day");

    let stripped = results_to_records(&results, HeaderRow::Strip);
    assert_eq!(stripped.len(), 1);
    assert_eq!(stripped[0]["error_count"], "17");
}

#[test]
fn records_serialize_in_column_order() {
    let results = results(
        r#"{
            "ResultSet": {
                "Rows": [{"Data": [{"VarCharValue": "z"}, {"VarCharValue": "a"}]}],
                "ResultSetMetadata": {"ColumnInfo": [
                    {"Name": "zeta", "Type": "varchar"},
                    {"Name": "alpha", "Type": "varchar"}
                ]}
            }
        }"#,
    );

    let records = results_to_records(&results, HeaderRow::Keep);
    let json = serde_json::to_string(&records[0]).unwrap();
    assert_eq!(json, r#"{"zeta":"z","alpha":"a"}"#);
}

#[tokio::test]
async fn select_survives_malformed_recorded_cells() {
    let runner = playback_runner("malformed_cells").await;

    let records = runner
        .select("select id, name from events", true)
        .await
        .unwrap()
        .records()
        .expect("records")
        .to_vec();

    assert_eq!(records.len(), 3);
    assert_eq!(records[1]["id"], PLACEHOLDER);
    assert_eq!(records[1]["name"], "alice");
    assert!(records[2].is_empty());
}
