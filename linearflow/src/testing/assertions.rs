//! Test assertions for runs and errors.

use crate::core::{ExecutionStatus, Record};
use crate::errors::{Phase, WorkflowError};
use crate::launcher::Execution;

/// Asserts that the error belongs to `phase` and has the given kind.
pub fn assert_error(err: &WorkflowError, phase: Phase, kind: &str) {
    assert_eq!(
        (err.phase(), err.kind()),
        (phase, kind),
        "Unexpected error: {err}"
    );
}

/// Asserts that the execution ended with `expected`.
pub fn assert_execution_status(execution: &Execution, expected: ExecutionStatus) {
    assert_eq!(
        execution.status(),
        expected,
        "Expected status {:?}, got {:?}",
        expected,
        execution.status()
    );
}

/// Asserts that the record holds `expected` under `key`.
pub fn assert_field(record: &Record, key: &str, expected: &serde_json::Value) {
    let actual = record.get(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected value {:?} for key '{}', got {:?}. Keys: {:?}",
        expected,
        key,
        actual,
        record.keys().collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assert_error() {
        assert_error(
            &WorkflowError::invalid_input("total"),
            Phase::Launch,
            "InvalidExecutionInput",
        );
    }

    #[test]
    #[should_panic(expected = "Unexpected error")]
    fn test_assert_error_fails_on_wrong_phase() {
        assert_error(
            &WorkflowError::invalid_input("total"),
            Phase::Monitor,
            "InvalidExecutionInput",
        );
    }

    #[test]
    fn test_assert_field() {
        let mut record = Record::new();
        record.insert("count".to_string(), json!(42));
        assert_field(&record, "count", &json!(42));
    }

    #[test]
    #[should_panic(expected = "Expected value")]
    fn test_assert_field_fails_on_missing_key() {
        assert_field(&Record::new(), "count", &json!(42));
    }
}
