//! Execution status as reported by the orchestration backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The authoritative status of an execution.
///
/// Only the backend moves an execution between these states; linearflow
/// observes and classifies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// The execution is still in flight.
    Running,
    /// The terminal stage completed.
    Succeeded,
    /// A stage failed.
    Failed,
    /// The backend's own execution-level timeout fired.
    TimedOut,
    /// The execution was stopped from outside.
    Aborted,
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::Running
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ExecutionStatus {
    /// Returns the wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED_OUT",
            Self::Aborted => "ABORTED",
        }
    }

    /// Returns true if no further transitions can happen.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut | Self::Aborted)
    }
}

/// Error returned when a status string is outside the known vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized execution status '{0}'")]
pub struct UnknownStatusError(pub String);

impl FromStr for ExecutionStatus {
    type Err = UnknownStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "TIMED_OUT" => Ok(Self::TimedOut),
            "ABORTED" => Ok(Self::Aborted),
            other => Err(UnknownStatusError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ExecutionStatus::Running.to_string(), "RUNNING");
        assert_eq!(ExecutionStatus::TimedOut.to_string(), "TIMED_OUT");
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Succeeded.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::TimedOut.is_terminal());
        assert!(ExecutionStatus::Aborted.is_terminal());
    }

    #[test]
    fn test_status_success_and_failure_are_disjoint() {
        for status in [
            ExecutionStatus::Running,
            ExecutionStatus::Succeeded,
            ExecutionStatus::Failed,
            ExecutionStatus::TimedOut,
            ExecutionStatus::Aborted,
        ] {
            assert!(!(status.is_success() && status.is_failure()));
            assert_eq!(status.as_str().parse::<ExecutionStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_status_parse_unknown() {
        let err = "PENDING_REDRIVE".parse::<ExecutionStatus>().unwrap_err();
        assert_eq!(err.0, "PENDING_REDRIVE");
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&ExecutionStatus::TimedOut).unwrap();
        assert_eq!(json, r#""TIMED_OUT""#);

        let deserialized: ExecutionStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, ExecutionStatus::TimedOut);
    }
}
