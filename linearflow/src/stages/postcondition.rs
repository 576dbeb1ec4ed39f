//! Postconditions checked against the output of a successful execution.

use crate::core::Record;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// A failed postcondition: which field was wrong and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostconditionFailure {
    /// The offending field.
    pub field: String,
    /// What was wrong with it.
    pub reason: String,
}

impl PostconditionFailure {
    /// Creates a new failure.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A shape/value check on the output of a terminal stage.
pub trait Postcondition: Send + Sync + Debug {
    /// Checks `output`, returning the first violation found.
    fn check(&self, output: &Record) -> Result<(), PostconditionFailure>;
}

/// Requires a field to equal a literal value.
#[derive(Debug, Clone)]
pub struct FieldEquals {
    field: String,
    expected: Value,
}

impl FieldEquals {
    /// Creates a new equality check.
    #[must_use]
    pub fn new(field: impl Into<String>, expected: Value) -> Self {
        Self {
            field: field.into(),
            expected,
        }
    }
}

impl Postcondition for FieldEquals {
    fn check(&self, output: &Record) -> Result<(), PostconditionFailure> {
        match output.get(&self.field) {
            Some(actual) if *actual == self.expected => Ok(()),
            Some(actual) => Err(PostconditionFailure::new(
                &self.field,
                format!("expected {}, got {actual}", self.expected),
            )),
            None => Err(PostconditionFailure::new(
                &self.field,
                format!("expected {}, field is missing", self.expected),
            )),
        }
    }
}

/// Requires a field to be a non-empty string.
#[derive(Debug, Clone)]
pub struct NonEmptyString {
    field: String,
}

impl NonEmptyString {
    /// Creates a new non-empty check.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Postcondition for NonEmptyString {
    fn check(&self, output: &Record) -> Result<(), PostconditionFailure> {
        match output.get(&self.field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
            Some(Value::String(_)) => Err(PostconditionFailure::new(&self.field, "must not be empty")),
            Some(other) => Err(PostconditionFailure::new(
                &self.field,
                format!("must be a string, got {other}"),
            )),
            None => Err(PostconditionFailure::new(&self.field, "field is missing")),
        }
    }
}

/// Requires every contained postcondition to hold, checked in order.
#[derive(Debug, Clone, Default)]
pub struct AllOf {
    checks: Vec<Arc<dyn Postcondition>>,
}

impl AllOf {
    /// Creates an empty conjunction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a check.
    #[must_use]
    pub fn with(mut self, check: impl Postcondition + 'static) -> Self {
        self.checks.push(Arc::new(check));
        self
    }
}

impl Postcondition for AllOf {
    fn check(&self, output: &Record) -> Result<(), PostconditionFailure> {
        self.checks.iter().try_for_each(|check| check.check(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record_from_value;
    use serde_json::json;

    fn record(value: Value) -> Record {
        record_from_value(value).unwrap()
    }

    #[test]
    fn test_field_equals() {
        let check = FieldEquals::new("status", json!("SHIPPED"));

        assert!(check.check(&record(json!({"status": "SHIPPED"}))).is_ok());

        let failure = check.check(&record(json!({"status": "FULFILLED"}))).unwrap_err();
        assert_eq!(failure.field, "status");
        assert!(failure.reason.contains("FULFILLED"));

        assert!(check.check(&record(json!({}))).is_err());
    }

    #[test]
    fn test_non_empty_string() {
        let check = NonEmptyString::new("trackingNumber");

        assert!(check.check(&record(json!({"trackingNumber": "TRACK123"}))).is_ok());
        assert!(check.check(&record(json!({"trackingNumber": ""}))).is_err());
        assert!(check.check(&record(json!({"trackingNumber": "  "}))).is_err());
        assert!(check.check(&record(json!({"trackingNumber": 42}))).is_err());
        assert!(check.check(&record(json!({}))).is_err());
    }

    #[test]
    fn test_all_of_reports_first_failure() {
        let check = AllOf::new()
            .with(FieldEquals::new("status", json!("SHIPPED")))
            .with(NonEmptyString::new("trackingNumber"));

        let failure = check.check(&record(json!({"status": "PENDING"}))).unwrap_err();
        assert_eq!(failure.field, "status");

        let failure = check.check(&record(json!({"status": "SHIPPED"}))).unwrap_err();
        assert_eq!(failure.field, "trackingNumber");
    }
}
