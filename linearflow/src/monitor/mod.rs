//! Execution monitoring: the bounded polling loop.
//!
//! The monitor never drives an execution. It describes it on a fixed cadence,
//! classifies what the backend reports, and stops at the first terminal
//! status or when its attempt budget runs out:
//!
//! ```text
//! RUNNING --(backend resolves success)--> SUCCEEDED
//! RUNNING --(backend resolves failure)--> FAILED
//! RUNNING --(backend timeout)-----------> TIMED_OUT
//! RUNNING --(external abort)------------> ABORTED
//! RUNNING --(attempt budget exhausted)--> POLLING_EXHAUSTED (monitor-local)
//! ```
//!
//! On exhaustion a single stop request is sent. Its failure is logged and
//! never replaces the exhaustion result.

mod outcome;

pub use outcome::{PollOutcome, PollReport};

use crate::backend::OrchestrationBackend;
use crate::config::MonitorConfig;
use crate::core::{record_from_value, ExecutionStatus, Record};
use crate::errors::{BackendError, Phase, WorkflowError};
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::launcher::Execution;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cause sent with the stop request issued on exhaustion.
pub const EXHAUSTED_STOP_CAUSE: &str = "monitor attempt budget exhausted";

/// Polls executions until they settle.
pub struct ExecutionMonitor {
    backend: Arc<dyn OrchestrationBackend>,
    config: MonitorConfig,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ExecutionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionMonitor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ExecutionMonitor {
    /// Creates a monitor with a fixed cadence.
    #[must_use]
    pub fn new(backend: Arc<dyn OrchestrationBackend>, config: MonitorConfig) -> Self {
        Self {
            backend,
            config,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the polling configuration.
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Polls `execution_handle` until a terminal status or the attempt
    /// budget is reached.
    ///
    /// Sleeps the configured interval between attempts, never after the last
    /// one. Describe failures and unrecognized statuses are returned as
    /// [`WorkflowError::Backend`] without retrying.
    pub async fn poll(&self, execution_handle: &str) -> Result<PollReport, WorkflowError> {
        let max_attempts = self.config.max_attempts.max(1);
        let interval = self.config.poll_interval();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let response = self
                .backend
                .describe(execution_handle)
                .await
                .map_err(monitor_error)?;
            let status: ExecutionStatus = response.status.parse().map_err(|e| {
                monitor_error(BackendError::unexpected_response("describe", format!("{e}")))
            })?;

            debug!(
                execution = %execution_handle,
                attempt = attempts,
                max_attempts,
                status = %status,
                "Polled execution"
            );
            self.event_sink.try_emit(
                event_types::EXECUTION_POLLED,
                Some(json!({
                    "execution": execution_handle,
                    "attempt": attempts,
                    "status": status,
                })),
            );

            let outcome = match status {
                ExecutionStatus::Running => None,
                ExecutionStatus::Succeeded => Some(PollOutcome::Succeeded {
                    output: response.output,
                }),
                ExecutionStatus::Failed => Some(PollOutcome::Failed {
                    error: response.error,
                    cause: response.cause,
                }),
                ExecutionStatus::TimedOut => Some(PollOutcome::TimedOut {
                    error: response.error,
                    cause: response.cause,
                }),
                ExecutionStatus::Aborted => Some(PollOutcome::Aborted {
                    error: response.error,
                    cause: response.cause,
                }),
            };

            if let Some(outcome) = outcome {
                return Ok(PollReport { outcome, attempts });
            }
            if attempts >= max_attempts {
                break;
            }
            tokio::time::sleep(interval).await;
        }

        warn!(
            execution = %execution_handle,
            attempts,
            "Execution still running after the last attempt"
        );
        self.event_sink
            .emit(
                event_types::EXECUTION_POLLING_EXHAUSTED,
                Some(json!({"execution": execution_handle, "attempts": attempts})),
            )
            .await;
        self.request_stop(execution_handle).await;

        Ok(PollReport {
            outcome: PollOutcome::PollingExhausted {
                last_status: ExecutionStatus::Running,
            },
            attempts,
        })
    }

    /// Polls `execution` until it settles, records what was observed, and
    /// turns every outcome other than a verified success into an error.
    ///
    /// On SUCCEEDED the terminal stage's postcondition, if any, is checked
    /// exactly once against the output.
    pub async fn watch(&self, execution: &mut Execution) -> Result<PollReport, WorkflowError> {
        let handle = execution.handle().to_string();
        let report = self.poll(&handle).await?;

        match &report.outcome {
            PollOutcome::Succeeded { output } => {
                let output = parse_output(output.as_deref())?;
                execution.observe(ExecutionStatus::Succeeded, Some(output.clone()), None, None);
                self.check_postcondition(execution, &output).await?;

                info!(execution = %handle, attempts = report.attempts, "Execution succeeded");
                self.event_sink
                    .emit(
                        event_types::EXECUTION_SUCCEEDED,
                        Some(json!({"execution": handle, "attempts": report.attempts})),
                    )
                    .await;
                Ok(report)
            }
            PollOutcome::Failed { error, cause }
            | PollOutcome::TimedOut { error, cause }
            | PollOutcome::Aborted { error, cause } => {
                let status = report.outcome.status().unwrap_or(ExecutionStatus::Failed);
                execution.observe(status, None, error.clone(), cause.clone());

                warn!(
                    execution = %handle,
                    status = %status,
                    error = ?error,
                    cause = ?cause,
                    "Execution did not succeed"
                );
                self.event_sink
                    .emit(
                        event_types::EXECUTION_FAILED,
                        Some(json!({
                            "execution": handle,
                            "status": status,
                            "error": error,
                            "cause": cause,
                        })),
                    )
                    .await;
                Err(WorkflowError::ExecutionFailed {
                    execution: handle,
                    status,
                    error: error.clone(),
                    cause: cause.clone(),
                })
            }
            PollOutcome::PollingExhausted { last_status } => Err(WorkflowError::PollingExhausted {
                execution: handle,
                last_status: *last_status,
                attempts: report.attempts,
            }),
        }
    }

    async fn check_postcondition(
        &self,
        execution: &Execution,
        output: &Record,
    ) -> Result<(), WorkflowError> {
        let stage = execution.definition().terminal_stage();
        let Some(postcondition) = stage.postcondition() else {
            return Ok(());
        };

        if let Err(failure) = postcondition.check(output) {
            warn!(
                execution = %execution.handle(),
                stage = %stage.name(),
                field = %failure.field,
                reason = %failure.reason,
                "Execution output violates postcondition"
            );
            self.event_sink
                .emit(
                    event_types::EXECUTION_POSTCONDITION_VIOLATED,
                    Some(json!({
                        "execution": execution.handle(),
                        "stage": stage.name(),
                        "field": failure.field,
                    })),
                )
                .await;
            return Err(WorkflowError::PostconditionViolation {
                execution: execution.handle().to_string(),
                stage: stage.name().to_string(),
                field: failure.field,
                reason: failure.reason,
            });
        }
        Ok(())
    }

    async fn request_stop(&self, execution_handle: &str) {
        match self.backend.stop(execution_handle, EXHAUSTED_STOP_CAUSE).await {
            Ok(()) => {
                info!(execution = %execution_handle, "Stop requested");
                self.event_sink
                    .emit(
                        event_types::EXECUTION_STOP_REQUESTED,
                        Some(json!({"execution": execution_handle})),
                    )
                    .await;
            }
            Err(e) => {
                warn!(execution = %execution_handle, error = %e, "Failed to stop execution");
                self.event_sink
                    .emit(
                        event_types::EXECUTION_STOP_FAILED,
                        Some(json!({"execution": execution_handle, "error": e.to_string()})),
                    )
                    .await;
            }
        }
    }
}

fn monitor_error(source: BackendError) -> WorkflowError {
    WorkflowError::Backend {
        phase: Phase::Monitor,
        source,
    }
}

/// Parses the backend's output. A missing output is an empty record so that
/// postconditions report the field they expected.
fn parse_output(output: Option<&str>) -> Result<Record, WorkflowError> {
    let Some(text) = output else {
        return Ok(Record::new());
    };

    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(record_from_value)
        .ok_or_else(|| {
            monitor_error(BackendError::unexpected_response(
                "describe",
                "execution output is not a JSON object",
            ))
        })
}
