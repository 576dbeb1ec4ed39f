//! Error types for linearflow.
//!
//! Every failure of a workflow run is reported as a [`WorkflowError`] that
//! names the phase of the run it belongs to (definition, registration,
//! launch or monitor) and the specific condition that was hit.

use crate::core::ExecutionStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The phase of a workflow run in which an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Building or parsing a workflow definition.
    Definition,
    /// Registering a definition with the backend.
    Registration,
    /// Starting an execution.
    Launch,
    /// Polling an execution until it settles.
    Monitor,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Definition => write!(f, "definition"),
            Self::Registration => write!(f, "registration"),
            Self::Launch => write!(f, "launch"),
            Self::Monitor => write!(f, "monitor"),
        }
    }
}

/// The main error type for workflow runs.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The definition is structurally invalid.
    #[error("{0}")]
    MalformedDefinition(#[from] MalformedDefinitionError),

    /// The backend did not hand back a definition handle.
    #[error("Registration failed for '{name}': {reason}")]
    RegistrationFailed {
        /// The registration name that was submitted.
        name: String,
        /// What went wrong.
        reason: String,
        /// The backend error, if the call itself failed.
        #[source]
        source: Option<BackendError>,
    },

    /// The backend did not hand back an execution handle.
    #[error("Launch failed for '{launch_name}': {reason}")]
    LaunchFailed {
        /// The launch name that was submitted.
        launch_name: String,
        /// What went wrong.
        reason: String,
        /// The backend error, if the call itself failed.
        #[source]
        source: Option<BackendError>,
    },

    /// The execution input lacks a required field.
    #[error("Invalid execution input: missing required field '{field}'")]
    InvalidExecutionInput {
        /// The first missing field in declaration order.
        field: String,
    },

    /// The backend reported FAILED, TIMED_OUT or ABORTED.
    #[error(
        "Execution '{execution}' finished with status {status}: {}",
        .error.as_deref().unwrap_or("no diagnostic")
    )]
    ExecutionFailed {
        /// The execution handle.
        execution: String,
        /// The terminal status reported by the backend.
        status: ExecutionStatus,
        /// Backend error name, verbatim.
        error: Option<String>,
        /// Backend error cause, verbatim.
        cause: Option<String>,
    },

    /// The monitor ran out of attempts while the execution was still running.
    #[error("Polling exhausted for '{execution}' after {attempts} attempts (last status: {last_status})")]
    PollingExhausted {
        /// The execution handle.
        execution: String,
        /// The last status observed.
        last_status: ExecutionStatus,
        /// Number of describe calls made.
        attempts: u32,
    },

    /// The backend reported SUCCEEDED but the output has the wrong shape.
    #[error("Postcondition of stage '{stage}' violated on field '{field}': {reason}")]
    PostconditionViolation {
        /// The execution handle.
        execution: String,
        /// The terminal stage whose postcondition failed.
        stage: String,
        /// The offending field.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A backend call failed outside of the handle-returning calls.
    #[error("Backend error during {phase}: {source}")]
    Backend {
        /// The phase in which the call was made.
        phase: Phase,
        /// The underlying backend error.
        #[source]
        source: BackendError,
    },
}

impl WorkflowError {
    /// Creates a registration failure.
    #[must_use]
    pub fn registration_failed(
        name: impl Into<String>,
        reason: impl Into<String>,
        source: Option<BackendError>,
    ) -> Self {
        Self::RegistrationFailed {
            name: name.into(),
            reason: reason.into(),
            source,
        }
    }

    /// Creates a launch failure.
    #[must_use]
    pub fn launch_failed(
        launch_name: impl Into<String>,
        reason: impl Into<String>,
        source: Option<BackendError>,
    ) -> Self {
        Self::LaunchFailed {
            launch_name: launch_name.into(),
            reason: reason.into(),
            source,
        }
    }

    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input(field: impl Into<String>) -> Self {
        Self::InvalidExecutionInput {
            field: field.into(),
        }
    }

    /// Returns the phase of the run this error belongs to.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::MalformedDefinition(_) => Phase::Definition,
            Self::RegistrationFailed { .. } => Phase::Registration,
            Self::LaunchFailed { .. } | Self::InvalidExecutionInput { .. } => Phase::Launch,
            Self::ExecutionFailed { .. }
            | Self::PollingExhausted { .. }
            | Self::PostconditionViolation { .. } => Phase::Monitor,
            Self::Backend { phase, .. } => *phase,
        }
    }

    /// Returns a stable identifier for the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedDefinition(_) => "MalformedDefinition",
            Self::RegistrationFailed { .. } => "RegistrationFailed",
            Self::LaunchFailed { .. } => "LaunchFailed",
            Self::InvalidExecutionInput { .. } => "InvalidExecutionInput",
            Self::ExecutionFailed { .. } => "ExecutionFailed",
            Self::PollingExhausted { .. } => "PollingExhausted",
            Self::PostconditionViolation { .. } => "PostconditionViolation",
            Self::Backend { .. } => "Backend",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("phase".to_string(), serde_json::json!(self.phase()));

        match self {
            Self::MalformedDefinition(err) => {
                map.insert("stages".to_string(), serde_json::json!(err.stages));
                map.insert("code".to_string(), serde_json::json!(err.error_info.code));
            }
            Self::RegistrationFailed { name, .. } => {
                map.insert("name".to_string(), serde_json::json!(name));
            }
            Self::LaunchFailed { launch_name, .. } => {
                map.insert("launch_name".to_string(), serde_json::json!(launch_name));
            }
            Self::InvalidExecutionInput { field } => {
                map.insert("field".to_string(), serde_json::json!(field));
            }
            Self::ExecutionFailed {
                execution,
                status,
                error,
                cause,
            } => {
                map.insert("execution".to_string(), serde_json::json!(execution));
                map.insert("status".to_string(), serde_json::json!(status));
                if let Some(error) = error {
                    map.insert("error".to_string(), serde_json::json!(error));
                }
                if let Some(cause) = cause {
                    map.insert("cause".to_string(), serde_json::json!(cause));
                }
            }
            Self::PollingExhausted {
                execution,
                last_status,
                attempts,
            } => {
                map.insert("execution".to_string(), serde_json::json!(execution));
                map.insert("last_status".to_string(), serde_json::json!(last_status));
                map.insert("attempts".to_string(), serde_json::json!(attempts));
            }
            Self::PostconditionViolation {
                execution,
                stage,
                field,
                ..
            } => {
                map.insert("execution".to_string(), serde_json::json!(execution));
                map.insert("stage".to_string(), serde_json::json!(stage));
                map.insert("field".to_string(), serde_json::json!(field));
            }
            Self::Backend { .. } => {}
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "DEFINITION-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a workflow definition is not a single linear path.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct MalformedDefinitionError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl MalformedDefinitionError {
    fn new(message: String, stages: Vec<String>, error_info: ContractErrorInfo) -> Self {
        Self {
            message,
            stages,
            error_info,
        }
    }

    /// The definition has no stages at all.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(
            "Workflow definition has no stages".to_string(),
            Vec::new(),
            ContractErrorInfo::new("DEFINITION-EMPTY", "Cannot build an empty workflow")
                .with_fix_hint("Add at least one stage before building."),
        )
    }

    /// Two stages share a name.
    #[must_use]
    pub fn duplicate(name: &str) -> Self {
        Self::new(
            format!("Duplicate stage name '{name}'"),
            vec![name.to_string()],
            ContractErrorInfo::new("DEFINITION-DUPLICATE", format!("Stage '{name}' is declared twice"))
                .with_fix_hint("Give every stage a unique name."),
        )
    }

    /// A stage names a successor that does not exist.
    #[must_use]
    pub fn unknown_successor(stage: &str, successor: &str) -> Self {
        Self::new(
            format!("Stage '{stage}' has unknown successor '{successor}'"),
            vec![stage.to_string(), successor.to_string()],
            ContractErrorInfo::new(
                "DEFINITION-UNKNOWN-SUCCESSOR",
                format!("Successor '{successor}' not found"),
            )
            .with_fix_hint("Check the successor name for typos or add the missing stage."),
        )
    }

    /// The start stage does not exist.
    #[must_use]
    pub fn unknown_start(start: &str) -> Self {
        Self::new(
            format!("Start stage '{start}' is not defined"),
            vec![start.to_string()],
            ContractErrorInfo::new("DEFINITION-UNKNOWN-START", format!("Start stage '{start}' not found")),
        )
    }

    /// Walking successors revisits a stage.
    #[must_use]
    pub fn cycle(path: Vec<String>) -> Self {
        let joined = path.join(" -> ");
        Self::new(
            format!("Cycle detected in workflow: {joined}"),
            path,
            ContractErrorInfo::new("DEFINITION-CYCLE", format!("Stages form a cycle: {joined}"))
                .with_fix_hint("Point the last stage of the chain at the terminal marker."),
        )
    }

    /// More than one stage has no successor.
    #[must_use]
    pub fn ambiguous_terminal(stages: Vec<String>) -> Self {
        Self::new(
            format!("Multiple terminal stages: {}", stages.join(", ")),
            stages,
            ContractErrorInfo::new("DEFINITION-AMBIGUOUS-TERMINAL", "A linear workflow has exactly one terminal stage")
                .with_fix_hint("Give every stage but the last a successor."),
        )
    }

    /// Some stages are never reached from the start stage.
    #[must_use]
    pub fn unreachable(stages: Vec<String>) -> Self {
        Self::new(
            format!("Stages not reachable from the start stage: {}", stages.join(", ")),
            stages,
            ContractErrorInfo::new("DEFINITION-UNREACHABLE", "Every stage must lie on the single path")
                .with_fix_hint("Link the stages into one chain or remove them."),
        )
    }

    /// The serialized document could not be parsed.
    #[must_use]
    pub fn invalid_document(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(
            format!("Invalid definition document: {reason}"),
            Vec::new(),
            ContractErrorInfo::new("DEFINITION-DOCUMENT", reason),
        )
    }
}

/// Errors reported by external collaborators (orchestration backend, object
/// store, queue).
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The referenced resource does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// The kind of resource (execution, definition, object...).
        resource: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The request was rejected as invalid.
    #[error("Invalid request to {operation}: {message}")]
    InvalidRequest {
        /// The operation that was called.
        operation: String,
        /// Why it was rejected.
        message: String,
    },

    /// The collaborator answered with something outside its contract.
    #[error("Unexpected response from {operation}: {message}")]
    UnexpectedResponse {
        /// The operation that was called.
        operation: String,
        /// What was unexpected.
        message: String,
    },

    /// The collaborator could not be reached or failed internally.
    #[error("{operation} unavailable: {message}")]
    Unavailable {
        /// The operation that was called.
        operation: String,
        /// What went wrong.
        message: String,
    },
}

impl BackendError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Creates an invalid request error.
    #[must_use]
    pub fn invalid_request(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an unexpected response error.
    #[must_use]
    pub fn unexpected_response(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error() {
        let err = MalformedDefinitionError::cycle(vec!["a".to_string(), "b".to_string(), "a".to_string()]);

        assert!(err.to_string().contains("a -> b -> a"));
        assert_eq!(err.error_info.code, "DEFINITION-CYCLE");
        assert!(err.error_info.fix_hint.is_some());
    }

    #[test]
    fn test_phase_mapping() {
        let err: WorkflowError = MalformedDefinitionError::empty().into();
        assert_eq!(err.phase(), Phase::Definition);
        assert_eq!(WorkflowError::invalid_input("orderId").phase(), Phase::Launch);
        assert_eq!(
            WorkflowError::registration_failed("wf", "no handle", None).phase(),
            Phase::Registration
        );

        let exhausted = WorkflowError::PollingExhausted {
            execution: "exec-1".to_string(),
            last_status: ExecutionStatus::Running,
            attempts: 30,
        };
        assert_eq!(exhausted.phase(), Phase::Monitor);
    }

    #[test]
    fn test_execution_failed_message() {
        let err = WorkflowError::ExecutionFailed {
            execution: "exec-1".to_string(),
            status: ExecutionStatus::TimedOut,
            error: None,
            cause: None,
        };
        assert_eq!(
            err.to_string(),
            "Execution 'exec-1' finished with status TIMED_OUT: no diagnostic"
        );
    }

    #[test]
    fn test_to_dict() {
        let err = WorkflowError::invalid_input("orderId");
        let dict = err.to_dict();

        assert_eq!(dict.get("type").unwrap(), "InvalidExecutionInput");
        assert_eq!(dict.get("phase").unwrap(), "launch");
        assert_eq!(dict.get("field").unwrap(), "orderId");
    }

    #[test]
    fn test_registration_failed_source() {
        use std::error::Error as _;

        let err = WorkflowError::registration_failed(
            "wf",
            "backend call failed",
            Some(BackendError::unavailable("register", "connection refused")),
        );
        assert!(err.source().is_some());
        assert!(WorkflowError::registration_failed("wf", "no handle", None)
            .source()
            .is_none());
    }
}
