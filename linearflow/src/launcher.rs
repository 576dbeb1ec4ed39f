//! Execution launching.

use crate::backend::OrchestrationBackend;
use crate::core::{first_missing_field, ExecutionStatus, Record};
use crate::definition::WorkflowDefinition;
use crate::errors::WorkflowError;
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::registry::RegisteredDefinition;
use crate::utils::{format_iso8601, next_sequence, now_utc, unix_millis, Timestamp};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Longest launch name the launcher produces.
pub const MAX_LAUNCH_NAME_LEN: usize = 80;

const LAUNCH_PREFIX: &str = "execution";
const FALLBACK_KEY: &str = "run";

/// One run of a registered definition.
///
/// The status mirrors what the backend last reported. Once the status is
/// terminal the execution is frozen and later observations are ignored.
#[derive(Debug, Clone)]
pub struct Execution {
    handle: String,
    launch_name: String,
    definition_handle: String,
    definition: Arc<WorkflowDefinition>,
    input: Record,
    status: ExecutionStatus,
    output: Option<Record>,
    error: Option<String>,
    cause: Option<String>,
    started_at: Timestamp,
}

impl Execution {
    /// Returns the opaque execution handle.
    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Returns the unique launch name.
    #[must_use]
    pub fn launch_name(&self) -> &str {
        &self.launch_name
    }

    /// Returns the handle of the definition this execution runs.
    #[must_use]
    pub fn definition_handle(&self) -> &str {
        &self.definition_handle
    }

    /// Returns the definition this execution runs.
    #[must_use]
    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// Returns the input record.
    #[must_use]
    pub fn input(&self) -> &Record {
        &self.input
    }

    /// Returns the last observed status.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Returns the output record. Only set when the status is SUCCEEDED.
    #[must_use]
    pub fn output(&self) -> Option<&Record> {
        self.output.as_ref()
    }

    /// Returns the backend error name, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the backend error cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    /// Returns when the execution was started.
    #[must_use]
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Returns true once the status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Records an observation. Returns false if the execution was already
    /// frozen.
    pub(crate) fn observe(
        &mut self,
        status: ExecutionStatus,
        output: Option<Record>,
        error: Option<String>,
        cause: Option<String>,
    ) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = status;
        self.output = if status.is_success() { output } else { None };
        self.error = error;
        self.cause = cause;
        true
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("handle".to_string(), json!(self.handle));
        map.insert("launch_name".to_string(), json!(self.launch_name));
        map.insert("definition_handle".to_string(), json!(self.definition_handle));
        map.insert("status".to_string(), json!(self.status));
        map.insert("input".to_string(), Value::Object(self.input.clone()));
        map.insert("started_at".to_string(), json!(format_iso8601(&self.started_at)));
        if let Some(output) = &self.output {
            map.insert("output".to_string(), Value::Object(output.clone()));
        }
        if let Some(error) = &self.error {
            map.insert("error".to_string(), json!(error));
        }
        if let Some(cause) = &self.cause {
            map.insert("cause".to_string(), json!(cause));
        }
        map
    }
}

/// Starts executions of registered definitions.
pub struct ExecutionLauncher {
    backend: Arc<dyn OrchestrationBackend>,
    correlation_field: Option<String>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ExecutionLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionLauncher")
            .field("correlation_field", &self.correlation_field)
            .finish_non_exhaustive()
    }
}

impl ExecutionLauncher {
    /// Creates a launcher.
    #[must_use]
    pub fn new(backend: Arc<dyn OrchestrationBackend>) -> Self {
        Self {
            backend,
            correlation_field: None,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Names launches after this input field instead of the definition's
    /// first required field.
    #[must_use]
    pub fn with_correlation_field(mut self, field: impl Into<String>) -> Self {
        self.correlation_field = Some(field.into());
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Starts an execution, naming it after the input's correlation field.
    ///
    /// The input is checked against the definition's required fields before
    /// the backend is contacted.
    pub async fn start(
        &self,
        registered: &RegisteredDefinition,
        input: Record,
    ) -> Result<Execution, WorkflowError> {
        validate_input(registered.definition(), &input)?;
        let key = self.correlation_key(registered.definition(), &input);
        self.launch(registered, &key, input).await
    }

    /// Starts an execution named after `key`.
    pub async fn start_with_key(
        &self,
        registered: &RegisteredDefinition,
        key: &str,
        input: Record,
    ) -> Result<Execution, WorkflowError> {
        validate_input(registered.definition(), &input)?;
        self.launch(registered, key, input).await
    }

    fn correlation_key(&self, definition: &WorkflowDefinition, input: &Record) -> String {
        let field = self
            .correlation_field
            .as_deref()
            .or_else(|| definition.required_input_fields().first().map(String::as_str));

        match field.and_then(|f| input.get(f)) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => FALLBACK_KEY.to_string(),
            Some(other) => other.to_string(),
        }
    }

    async fn launch(
        &self,
        registered: &RegisteredDefinition,
        key: &str,
        input: Record,
    ) -> Result<Execution, WorkflowError> {
        let started_at = now_utc();
        let sequence = next_sequence();
        let launch_name = launch_name(key, unix_millis(&started_at), sequence);

        let payload = serde_json::to_string(&input).map_err(|e| {
            WorkflowError::launch_failed(&launch_name, format!("input could not be serialized: {e}"), None)
        })?;

        info!(
            launch_name = %launch_name,
            definition = %registered.handle(),
            "Starting execution"
        );

        let response = self
            .backend
            .start(registered.handle(), &launch_name, &payload)
            .await
            .map_err(|source| {
                warn!(launch_name = %launch_name, error = %source, "Backend rejected launch");
                WorkflowError::launch_failed(&launch_name, "backend rejected the launch", Some(source))
            })?;

        let handle = response
            .execution_handle
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                WorkflowError::launch_failed(&launch_name, "backend returned no execution handle", None)
            })?;

        info!(launch_name = %launch_name, execution = %handle, "Execution started");
        self.event_sink
            .emit(
                event_types::EXECUTION_STARTED,
                Some(json!({"launch_name": launch_name, "execution": handle})),
            )
            .await;

        Ok(Execution {
            handle,
            launch_name,
            definition_handle: registered.handle().to_string(),
            definition: registered.shared_definition(),
            input,
            status: ExecutionStatus::Running,
            output: None,
            error: None,
            cause: None,
            started_at,
        })
    }
}

fn validate_input(definition: &WorkflowDefinition, input: &Record) -> Result<(), WorkflowError> {
    match first_missing_field(input, definition.required_input_fields()) {
        Some(field) => {
            warn!(field = %field, definition = %definition.name(), "Execution input is missing a required field");
            Err(WorkflowError::invalid_input(field))
        }
        None => Ok(()),
    }
}

/// Builds `execution-<key>-<millis>-<sequence>`, sanitizing the key to
/// `[A-Za-z0-9_-]` and shortening it so the name fits [`MAX_LAUNCH_NAME_LEN`].
fn launch_name(key: &str, millis: u64, sequence: u64) -> String {
    let suffix = format!("-{millis}-{sequence}");
    let budget = MAX_LAUNCH_NAME_LEN
        .saturating_sub(LAUNCH_PREFIX.len() + 1 + suffix.len())
        .max(1);

    let mut sanitized: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(budget)
        .collect();
    if sanitized.is_empty() {
        sanitized = FALLBACK_KEY.to_string();
    }

    format!("{LAUNCH_PREFIX}-{sanitized}{suffix}")
}
