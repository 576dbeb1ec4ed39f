//! A scripted orchestration backend.

use crate::backend::{
    DefinitionDescription, DescribeResponse, OrchestrationBackend, RegisterResponse,
    StartResponse,
};
use crate::errors::BackendError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Definition handle returned by a [`ScriptedBackend`].
pub const SCRIPTED_DEFINITION_HANDLE: &str = "scripted:definition";

/// Execution handle returned by a [`ScriptedBackend`].
pub const SCRIPTED_EXECUTION_HANDLE: &str = "scripted:execution";

/// A start call seen by a [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLaunch {
    /// The definition handle passed in.
    pub definition_handle: String,
    /// The launch name passed in.
    pub launch_name: String,
    /// The serialized input passed in.
    pub input: String,
}

/// A backend that replays describe responses from a script.
///
/// Responses are handed out in order and the last one repeats. Every call is
/// counted so tests can assert exactly how often the backend was reached.
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<DescribeResponse, BackendError>>>,
    definition_handle: Option<String>,
    execution_handle: Option<String>,
    stop_error: Option<BackendError>,
    registrations: Mutex<Vec<(String, DefinitionDescription)>>,
    launches: Mutex<Vec<RecordedLaunch>>,
    describe_calls: Mutex<usize>,
    stops: Mutex<Vec<(String, String)>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    /// Creates a backend whose executions stay RUNNING.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            definition_handle: Some(SCRIPTED_DEFINITION_HANDLE.to_string()),
            execution_handle: Some(SCRIPTED_EXECUTION_HANDLE.to_string()),
            stop_error: None,
            registrations: Mutex::new(Vec::new()),
            launches: Mutex::new(Vec::new()),
            describe_calls: Mutex::new(0),
            stops: Mutex::new(Vec::new()),
        }
    }

    /// Appends a describe response to the script.
    #[must_use]
    pub fn then(self, response: DescribeResponse) -> Self {
        self.script.lock().push_back(Ok(response));
        self
    }

    /// Appends `count` RUNNING responses to the script.
    #[must_use]
    pub fn then_running(self, count: usize) -> Self {
        (0..count).fold(self, |backend, _| backend.then(DescribeResponse::running()))
    }

    /// Appends a describe failure to the script.
    #[must_use]
    pub fn then_error(self, error: BackendError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Makes register succeed without a definition handle.
    #[must_use]
    pub fn without_definition_handle(mut self) -> Self {
        self.definition_handle = None;
        self
    }

    /// Makes start succeed without an execution handle.
    #[must_use]
    pub fn without_execution_handle(mut self) -> Self {
        self.execution_handle = None;
        self
    }

    /// Makes every stop request fail.
    #[must_use]
    pub fn with_failing_stop(mut self) -> Self {
        self.stop_error = Some(BackendError::unavailable("stop", "stop rejected"));
        self
    }

    /// Returns the number of register calls.
    pub fn register_count(&self) -> usize {
        self.registrations.lock().len()
    }

    /// Returns the number of start calls.
    pub fn start_count(&self) -> usize {
        self.launches.lock().len()
    }

    /// Returns the number of describe calls.
    pub fn describe_count(&self) -> usize {
        *self.describe_calls.lock()
    }

    /// Returns the number of stop calls, failed ones included.
    pub fn stop_count(&self) -> usize {
        self.stops.lock().len()
    }

    /// Returns the recorded start calls.
    pub fn launches(&self) -> Vec<RecordedLaunch> {
        self.launches.lock().clone()
    }

    /// Returns the recorded stop calls as `(execution handle, cause)` pairs.
    pub fn stops(&self) -> Vec<(String, String)> {
        self.stops.lock().clone()
    }

    /// Returns the registered names in call order.
    pub fn registered_names(&self) -> Vec<String> {
        self.registrations
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl OrchestrationBackend for ScriptedBackend {
    async fn register(
        &self,
        name: &str,
        document: &str,
        role: &str,
    ) -> Result<RegisterResponse, BackendError> {
        self.registrations.lock().push((
            name.to_string(),
            DefinitionDescription {
                document: document.to_string(),
                role: role.to_string(),
            },
        ));
        Ok(RegisterResponse {
            definition_handle: self.definition_handle.clone(),
        })
    }

    async fn describe_definition(
        &self,
        definition_handle: &str,
    ) -> Result<DefinitionDescription, BackendError> {
        if self.definition_handle.as_deref() != Some(definition_handle) {
            return Err(BackendError::not_found("definition", definition_handle));
        }
        self.registrations
            .lock()
            .last()
            .map(|(_, description)| description.clone())
            .ok_or_else(|| BackendError::not_found("definition", definition_handle))
    }

    async fn start(
        &self,
        definition_handle: &str,
        launch_name: &str,
        input: &str,
    ) -> Result<StartResponse, BackendError> {
        self.launches.lock().push(RecordedLaunch {
            definition_handle: definition_handle.to_string(),
            launch_name: launch_name.to_string(),
            input: input.to_string(),
        });
        Ok(StartResponse {
            execution_handle: self.execution_handle.clone(),
        })
    }

    async fn describe(&self, _execution_handle: &str) -> Result<DescribeResponse, BackendError> {
        *self.describe_calls.lock() += 1;

        let mut script = self.script.lock();
        if script.len() > 1 {
            if let Some(next) = script.pop_front() {
                return next;
            }
        }
        script
            .front()
            .cloned()
            .unwrap_or_else(|| Ok(DescribeResponse::running()))
    }

    async fn stop(&self, execution_handle: &str, cause: &str) -> Result<(), BackendError> {
        self.stops
            .lock()
            .push((execution_handle.to_string(), cause.to_string()));
        match &self.stop_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
