//! Reshape a result set into label → value records.

use indexmap::IndexMap;

use crate::config::HeaderRow;
use crate::model::{Datum, QueryResults, ResultSet, Row};

/// Value used for a cell with nothing to extract (NULL or malformed).
pub const PLACEHOLDER: &str = " ";

/// One row, keyed by column label, in column order.
pub type Record = IndexMap<String, String>;

/// Convert a fetched page into records. See [`result_set_to_records`].
pub fn results_to_records(results: &QueryResults, header: HeaderRow) -> Vec<Record> {
    result_set_to_records(&results.result_set, header)
}

/// Convert a result set into one record per row, in row order.
///
/// Labels are zipped with cell values by position; a row shorter or longer
/// than the label list is cut to the shorter of the two. Cells with no value
/// become [`PLACEHOLDER`]. With [`HeaderRow::Keep`] a header echo in the rows
/// comes through as an ordinary record.
pub fn result_set_to_records(result_set: &ResultSet, header: HeaderRow) -> Vec<Record> {
    let labels = result_set.labels();

    let skip = match header {
        HeaderRow::Strip if is_header_row(result_set.rows.first(), &labels) => 1,
        _ => 0,
    };

    result_set
        .rows
        .iter()
        .skip(skip)
        .map(|row| {
            labels
                .iter()
                .zip(row.data.iter().map(extract))
                .map(|(label, value)| (label.to_string(), value))
                .collect()
        })
        .collect()
}

fn extract(datum: &Datum) -> String {
    datum
        .var_char_value
        .clone()
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn is_header_row(row: Option<&Row>, labels: &[&str]) -> bool {
    let Some(row) = row else {
        return false;
    };
    !labels.is_empty()
        && row.data.len() == labels.len()
        && row
            .data
            .iter()
            .zip(labels)
            .all(|(datum, label)| datum.var_char_value.as_deref() == Some(*label))
}
