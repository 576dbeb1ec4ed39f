//! Records: the JSON objects that flow from stage to stage.

use serde_json::Value;

/// A record passed into and out of stage transforms.
pub type Record = serde_json::Map<String, Value>;

/// Returns true if `field` is present and not `null`.
#[must_use]
pub fn has_field(record: &Record, field: &str) -> bool {
    record.get(field).is_some_and(|value| !value.is_null())
}

/// Returns the first field of `fields`, in order, that `record` lacks.
#[must_use]
pub fn first_missing_field<'a>(record: &Record, fields: &'a [String]) -> Option<&'a str> {
    fields
        .iter()
        .find(|field| !has_field(record, field))
        .map(String::as_str)
}

/// Converts a JSON value into a record if it is an object.
#[must_use]
pub fn record_from_value(value: Value) -> Option<Record> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
