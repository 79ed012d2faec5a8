use crate::error::{ForecastError, Result};
use crate::schema::RawPoRecord;
use log::{info, warn};
use serde_json::Value;
use std::io::Read;

/// Parses a JSON batch document (an array of PO objects) into raw
/// records. Non-object elements are skipped with a warning; a document
/// that is not an array is an error.
pub fn records_from_json_str(json: &str) -> Result<Vec<RawPoRecord>> {
    records_from_value(serde_json::from_str(json)?)
}

pub fn records_from_reader<R: Read>(reader: R) -> Result<Vec<RawPoRecord>> {
    records_from_value(serde_json::from_reader(reader)?)
}

pub fn records_from_value(document: Value) -> Result<Vec<RawPoRecord>> {
    let entries = match document {
        Value::Array(entries) => entries,
        other => {
            return Err(ForecastError::InvalidBatchDocument(format!(
                "expected an array, got {}",
                json_type(&other)
            )));
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        if !entry.is_object() {
            warn!("expected an object for PO data, got {}; skipping entry", json_type(&entry));
            continue;
        }
        match serde_json::from_value::<RawPoRecord>(entry) {
            Ok(record) => records.push(record),
            Err(err) => warn!("skipping unreadable PO entry: {}", err),
        }
    }

    info!("loaded {} purchase order records", records.len());
    Ok(records)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
