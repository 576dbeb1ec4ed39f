//! Classified results of polling an execution.

use crate::core::ExecutionStatus;
use serde::{Deserialize, Serialize};

/// How a polling run ended.
///
/// Every terminal backend status has its own variant, plus the monitor-local
/// `PollingExhausted` for a budget that ran out while the execution was
/// still RUNNING.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollOutcome {
    /// The backend reported SUCCEEDED.
    Succeeded {
        /// Serialized output record, verbatim.
        output: Option<String>,
    },
    /// The backend reported FAILED.
    Failed {
        /// Error name, verbatim.
        error: Option<String>,
        /// Error cause, verbatim.
        cause: Option<String>,
    },
    /// The backend reported TIMED_OUT.
    TimedOut {
        /// Error name, verbatim.
        error: Option<String>,
        /// Error cause, verbatim.
        cause: Option<String>,
    },
    /// The backend reported ABORTED.
    Aborted {
        /// Error name, verbatim.
        error: Option<String>,
        /// Error cause, verbatim.
        cause: Option<String>,
    },
    /// The attempt budget ran out first.
    PollingExhausted {
        /// The last status the backend reported.
        last_status: ExecutionStatus,
    },
}

impl PollOutcome {
    /// Returns the backend status behind this outcome, or `None` for
    /// `PollingExhausted`.
    #[must_use]
    pub fn status(&self) -> Option<ExecutionStatus> {
        match self {
            Self::Succeeded { .. } => Some(ExecutionStatus::Succeeded),
            Self::Failed { .. } => Some(ExecutionStatus::Failed),
            Self::TimedOut { .. } => Some(ExecutionStatus::TimedOut),
            Self::Aborted { .. } => Some(ExecutionStatus::Aborted),
            Self::PollingExhausted { .. } => None,
        }
    }

    /// Returns the outcome name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.status()
            .map_or("POLLING_EXHAUSTED", |status| status.as_str())
    }

    /// Returns true for `Succeeded`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// The outcome of one polling run and how many describe calls it took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReport {
    /// How the run ended.
    pub outcome: PollOutcome,
    /// Number of describe calls made.
    pub attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_names() {
        assert_eq!(PollOutcome::Succeeded { output: None }.as_str(), "SUCCEEDED");
        assert_eq!(
            PollOutcome::TimedOut { error: None, cause: None }.status(),
            Some(ExecutionStatus::TimedOut)
        );
        let exhausted = PollOutcome::PollingExhausted {
            last_status: ExecutionStatus::Running,
        };
        assert_eq!(exhausted.as_str(), "POLLING_EXHAUSTED");
        assert_eq!(exhausted.status(), None);
        assert!(!exhausted.is_success());
    }

    #[test]
    fn test_report_serialization() {
        let report = PollReport {
            outcome: PollOutcome::PollingExhausted {
                last_status: ExecutionStatus::Running,
            },
            attempts: 30,
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({"outcome": {"outcome": "POLLING_EXHAUSTED", "last_status": "RUNNING"}, "attempts": 30})
        );
    }
}
