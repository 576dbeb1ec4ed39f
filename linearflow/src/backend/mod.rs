//! The orchestration backend port.
//!
//! [`OrchestrationBackend`] is the narrow contract the registry, launcher,
//! and monitor call into. Handles and statuses are passed through as the
//! backend reports them; classification happens in the monitor.

mod local;

pub use local::LocalBackend;

use crate::errors::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response to a definition registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Opaque definition handle, if the backend returned one.
    pub definition_handle: Option<String>,
}

impl RegisterResponse {
    /// Creates a response carrying `handle`.
    #[must_use]
    pub fn with_handle(handle: impl Into<String>) -> Self {
        Self {
            definition_handle: Some(handle.into()),
        }
    }
}

/// A registered definition as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionDescription {
    /// The serialized definition document.
    pub document: String,
    /// The execution role reference it was registered with.
    pub role: String,
}

/// Response to an execution start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResponse {
    /// Opaque execution handle, if the backend returned one.
    pub execution_handle: Option<String>,
}

impl StartResponse {
    /// Creates a response carrying `handle`.
    #[must_use]
    pub fn with_handle(handle: impl Into<String>) -> Self {
        Self {
            execution_handle: Some(handle.into()),
        }
    }
}

/// One status observation of an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeResponse {
    /// Raw status string.
    pub status: String,
    /// Serialized output record, present on success.
    pub output: Option<String>,
    /// Error name, present on failure.
    pub error: Option<String>,
    /// Error cause, present on failure.
    pub cause: Option<String>,
}

impl DescribeResponse {
    /// Creates a response with the given raw status and nothing else.
    #[must_use]
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            output: None,
            error: None,
            cause: None,
        }
    }

    /// A RUNNING observation.
    #[must_use]
    pub fn running() -> Self {
        Self::with_status("RUNNING")
    }

    /// A SUCCEEDED observation carrying `output`.
    #[must_use]
    pub fn succeeded(output: &Value) -> Self {
        Self {
            output: Some(output.to_string()),
            ..Self::with_status("SUCCEEDED")
        }
    }

    /// A failure observation with the given terminal status and diagnostic.
    #[must_use]
    pub fn failed(
        status: impl Into<String>,
        error: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            error: Some(error.into()),
            cause: Some(cause.into()),
            ..Self::with_status(status)
        }
    }
}

/// An external service that stores definitions and runs executions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrchestrationBackend: Send + Sync {
    /// Registers a serialized definition under `name`.
    async fn register(
        &self,
        name: &str,
        document: &str,
        role: &str,
    ) -> Result<RegisterResponse, BackendError>;

    /// Returns the stored form of a registered definition.
    async fn describe_definition(
        &self,
        definition_handle: &str,
    ) -> Result<DefinitionDescription, BackendError>;

    /// Starts an execution of a registered definition.
    async fn start(
        &self,
        definition_handle: &str,
        launch_name: &str,
        input: &str,
    ) -> Result<StartResponse, BackendError>;

    /// Reports the current status of an execution.
    async fn describe(&self, execution_handle: &str) -> Result<DescribeResponse, BackendError>;

    /// Requests that an execution stop.
    async fn stop(&self, execution_handle: &str, cause: &str) -> Result<(), BackendError>;
}
