//! In-process orchestration backend.

use super::{
    DefinitionDescription, DescribeResponse, OrchestrationBackend, RegisterResponse, StartResponse,
};
use crate::core::{record_from_value, Record};
use crate::definition::{DefinitionDocument, WorkflowDefinition};
use crate::errors::BackendError;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const HANDLE_PREFIX: &str = "local:linearflow";

#[derive(Debug)]
struct StoredDefinition {
    document: String,
    role: String,
    definition: Arc<WorkflowDefinition>,
}

#[derive(Debug)]
struct LocalExecution {
    definition: Arc<WorkflowDefinition>,
    input: Record,
    polls: u32,
    settled: Option<DescribeResponse>,
}

/// An [`OrchestrationBackend`] that runs definitions inside the process.
///
/// Registered documents are parsed back into definitions. An execution
/// reports RUNNING for the configured number of describe calls and then
/// resolves by running the definition's transforms over its input; a
/// transform failure resolves to FAILED with error `States.Runtime`.
///
/// Handles look like `local:linearflow:execution:<definition>:<launch>`, so
/// launch names are unique per definition.
#[derive(Debug, Default)]
pub struct LocalBackend {
    definitions: DashMap<String, StoredDefinition>,
    executions: DashMap<String, LocalExecution>,
    running_polls: u32,
    timeout_after: Option<u32>,
}

impl LocalBackend {
    /// Creates a backend that resolves executions on the first describe.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports RUNNING for the first `polls` describe calls of each execution.
    #[must_use]
    pub fn with_running_polls(mut self, polls: u32) -> Self {
        self.running_polls = polls;
        self
    }

    /// Reports TIMED_OUT once an execution has been described more than
    /// `polls` times without resolving.
    #[must_use]
    pub fn with_timeout_after(mut self, polls: Option<u32>) -> Self {
        self.timeout_after = polls;
        self
    }

    /// Returns the number of registered definitions.
    #[must_use]
    pub fn definition_count(&self) -> usize {
        self.definitions.len()
    }

    /// Returns the number of started executions.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executions.len()
    }

    fn resolve(execution: &LocalExecution) -> DescribeResponse {
        match execution.definition.run_locally(&execution.input) {
            Ok(output) => DescribeResponse::succeeded(&Value::Object(output)),
            Err(err) => DescribeResponse::failed("FAILED", "States.Runtime", err.to_string()),
        }
    }
}

#[async_trait]
impl OrchestrationBackend for LocalBackend {
    async fn register(
        &self,
        name: &str,
        document: &str,
        role: &str,
    ) -> Result<RegisterResponse, BackendError> {
        if role.trim().is_empty() {
            return Err(BackendError::invalid_request(
                "register",
                "execution role reference is empty",
            ));
        }

        let parsed = DefinitionDocument::from_json(document)
            .and_then(|doc| WorkflowDefinition::from_document(name, &doc))
            .map_err(|e| BackendError::invalid_request("register", e.to_string()))?;

        let handle = format!("{HANDLE_PREFIX}:definition:{name}");
        match self.definitions.entry(handle.clone()) {
            Entry::Occupied(_) => Err(BackendError::invalid_request(
                "register",
                format!("DefinitionAlreadyExists: {name}"),
            )),
            Entry::Vacant(slot) => {
                slot.insert(StoredDefinition {
                    document: document.to_string(),
                    role: role.to_string(),
                    definition: Arc::new(parsed),
                });
                debug!(handle = %handle, "Registered definition");
                Ok(RegisterResponse::with_handle(handle))
            }
        }
    }

    async fn describe_definition(
        &self,
        definition_handle: &str,
    ) -> Result<DefinitionDescription, BackendError> {
        self.definitions
            .get(definition_handle)
            .map(|stored| DefinitionDescription {
                document: stored.document.clone(),
                role: stored.role.clone(),
            })
            .ok_or_else(|| BackendError::not_found("definition", definition_handle))
    }

    async fn start(
        &self,
        definition_handle: &str,
        launch_name: &str,
        input: &str,
    ) -> Result<StartResponse, BackendError> {
        let definition = self
            .definitions
            .get(definition_handle)
            .map(|stored| Arc::clone(&stored.definition))
            .ok_or_else(|| BackendError::not_found("definition", definition_handle))?;

        let input = serde_json::from_str::<Value>(input)
            .ok()
            .and_then(record_from_value)
            .ok_or_else(|| BackendError::invalid_request("start", "input must be a JSON object"))?;

        let handle = format!(
            "{HANDLE_PREFIX}:execution:{}:{launch_name}",
            definition.name()
        );
        match self.executions.entry(handle.clone()) {
            Entry::Occupied(_) => Err(BackendError::invalid_request(
                "start",
                format!("ExecutionAlreadyExists: {launch_name}"),
            )),
            Entry::Vacant(slot) => {
                slot.insert(LocalExecution {
                    definition,
                    input,
                    polls: 0,
                    settled: None,
                });
                debug!(handle = %handle, "Started execution");
                Ok(StartResponse::with_handle(handle))
            }
        }
    }

    async fn describe(&self, execution_handle: &str) -> Result<DescribeResponse, BackendError> {
        let mut execution = self
            .executions
            .get_mut(execution_handle)
            .ok_or_else(|| BackendError::not_found("execution", execution_handle))?;

        if let Some(settled) = &execution.settled {
            return Ok(settled.clone());
        }

        execution.polls += 1;
        let response = if execution.polls > self.running_polls {
            Self::resolve(&execution)
        } else if self.timeout_after.is_some_and(|limit| execution.polls > limit) {
            DescribeResponse::failed(
                "TIMED_OUT",
                "States.Timeout",
                "execution exceeded its time limit",
            )
        } else {
            return Ok(DescribeResponse::running());
        };

        execution.settled = Some(response.clone());
        Ok(response)
    }

    async fn stop(&self, execution_handle: &str, cause: &str) -> Result<(), BackendError> {
        let mut execution = self
            .executions
            .get_mut(execution_handle)
            .ok_or_else(|| BackendError::not_found("execution", execution_handle))?;

        if execution.settled.is_none() {
            execution.settled = Some(DescribeResponse {
                cause: Some(cause.to_string()),
                ..DescribeResponse::with_status("ABORTED")
            });
            debug!(handle = %execution_handle, cause = %cause, "Stopped execution");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DefinitionBuilder;
    use crate::stages::{FnTransform, PassTransform, TransformError};
    use serde_json::json;

    fn document() -> String {
        DefinitionBuilder::new("orders")
            .stage(
                "Validate",
                Arc::new(PassTransform::new().forward("orderId").assign("status", json!("VALIDATED"))),
                crate::stages::Successor::next("Ship"),
            )
            .terminal(
                "Ship",
                Arc::new(
                    PassTransform::new()
                        .forwarding(["orderId", "status"])
                        .assign("status", json!("SHIPPED")),
                ),
            )
            .build()
            .unwrap()
            .to_json()
            .unwrap()
    }

    async fn registered(backend: &LocalBackend) -> String {
        backend
            .register("orders", &document(), "role/exec")
            .await
            .unwrap()
            .definition_handle
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_and_describe_definition() {
        let backend = LocalBackend::new();
        let handle = registered(&backend).await;

        let description = backend.describe_definition(&handle).await.unwrap();
        assert_eq!(description.role, "role/exec");
        assert_eq!(description.document, document());
        assert_eq!(backend.definition_count(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let backend = LocalBackend::new();

        let empty_role = backend.register("orders", &document(), " ").await;
        assert!(matches!(empty_role, Err(BackendError::InvalidRequest { .. })));

        let bad_document = backend.register("orders", "{}", "role").await;
        assert!(matches!(bad_document, Err(BackendError::InvalidRequest { .. })));

        registered(&backend).await;
        let duplicate = backend.register("orders", &document(), "role").await;
        assert!(matches!(duplicate, Err(BackendError::InvalidRequest { .. })));
    }

    #[tokio::test]
    async fn test_execution_resolves_after_running_polls() {
        let backend = LocalBackend::new().with_running_polls(2);
        let definition = registered(&backend).await;
        let execution = backend
            .start(&definition, "run-1", r#"{"orderId": "o-1"}"#)
            .await
            .unwrap()
            .execution_handle
            .unwrap();

        assert_eq!(backend.describe(&execution).await.unwrap().status, "RUNNING");
        assert_eq!(backend.describe(&execution).await.unwrap().status, "RUNNING");

        let done = backend.describe(&execution).await.unwrap();
        assert_eq!(done.status, "SUCCEEDED");
        let output: Value = serde_json::from_str(done.output.as_deref().unwrap()).unwrap();
        assert_eq!(output, json!({"orderId": "o-1", "status": "SHIPPED"}));

        // Settled executions stay frozen.
        assert_eq!(backend.describe(&execution).await.unwrap(), done);
    }

    #[tokio::test]
    async fn test_duplicate_launch_name_rejected() {
        let backend = LocalBackend::new();
        let definition = registered(&backend).await;

        backend.start(&definition, "run-1", "{}").await.unwrap();
        let err = backend.start(&definition, "run-1", "{}").await.unwrap_err();

        assert!(err.to_string().contains("ExecutionAlreadyExists"));
        assert_eq!(backend.execution_count(), 1);
    }

    #[tokio::test]
    async fn test_transform_failure_resolves_to_failed() {
        let backend = LocalBackend::new();
        let definition = registered(&backend).await;
        let execution = backend
            .start(&definition, "run-1", "{}")
            .await
            .unwrap()
            .execution_handle
            .unwrap();

        let response = backend.describe(&execution).await.unwrap();
        assert_eq!(response.status, "FAILED");
        assert_eq!(response.error.as_deref(), Some("States.Runtime"));
        assert!(response.cause.unwrap().contains("orderId"));
    }

    #[tokio::test]
    async fn test_timeout_and_stop() {
        let backend = LocalBackend::new()
            .with_running_polls(10)
            .with_timeout_after(Some(1));
        let definition = registered(&backend).await;
        let input = r#"{"orderId": "o-1"}"#;

        let timed = backend.start(&definition, "a", input).await.unwrap().execution_handle.unwrap();
        assert_eq!(backend.describe(&timed).await.unwrap().status, "RUNNING");
        assert_eq!(backend.describe(&timed).await.unwrap().status, "TIMED_OUT");

        let stopped = backend.start(&definition, "b", input).await.unwrap().execution_handle.unwrap();
        backend.stop(&stopped, "operator request").await.unwrap();
        let response = backend.describe(&stopped).await.unwrap();
        assert_eq!(response.status, "ABORTED");
        assert_eq!(response.cause.as_deref(), Some("operator request"));
    }

    #[tokio::test]
    async fn test_unknown_handles() {
        let backend = LocalBackend::new();
        assert!(matches!(
            backend.describe("missing").await,
            Err(BackendError::NotFound { .. })
        ));
        assert!(backend.stop("missing", "x").await.is_err());
        assert!(backend.start("missing", "run", "{}").await.is_err());
    }

    #[test]
    fn test_resolve_reports_stage() {
        let failing = FnTransform::new(|_: &Record| Err(TransformError::Failed("boom".to_string())));
        let definition = DefinitionBuilder::new("x")
            .terminal("Only", Arc::new(failing))
            .build()
            .unwrap();
        let execution = LocalExecution {
            definition: Arc::new(definition),
            input: Record::new(),
            polls: 1,
            settled: None,
        };

        let response = LocalBackend::resolve(&execution);
        assert_eq!(response.status, "FAILED");
        assert!(response.cause.unwrap().contains("Only"));
    }
}
