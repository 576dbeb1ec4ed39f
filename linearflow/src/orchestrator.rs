//! End-to-end workflow runs.
//!
//! A [`WorkflowRunner`] wires the registry, launcher, and monitor to one
//! backend and drives them strictly in sequence: register, start, watch.

use crate::backend::OrchestrationBackend;
use crate::config::OrchestratorConfig;
use crate::core::Record;
use crate::definition::WorkflowDefinition;
use crate::errors::WorkflowError;
use crate::events::EventSink;
use crate::launcher::{Execution, ExecutionLauncher};
use crate::monitor::ExecutionMonitor;
use crate::registry::{DefinitionRegistry, RegisteredDefinition};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// The result of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The registered definition.
    pub registered: RegisteredDefinition,
    /// The finished execution.
    pub execution: Execution,
    /// Number of describe calls the monitor made.
    pub attempts: u32,
}

impl RunReport {
    /// Returns the validated output record.
    #[must_use]
    pub fn output(&self) -> Option<&Record> {
        self.execution.output()
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        let mut map = self.execution.to_dict();
        map.insert("definition".to_string(), json!(self.registered.registration_name()));
        map.insert("attempts".to_string(), json!(self.attempts));
        map
    }
}

/// Runs workflows against one backend.
#[derive(Debug)]
pub struct WorkflowRunner {
    registry: DefinitionRegistry,
    launcher: ExecutionLauncher,
    monitor: ExecutionMonitor,
}

impl WorkflowRunner {
    /// Creates a runner from configuration.
    #[must_use]
    pub fn new(backend: Arc<dyn OrchestrationBackend>, config: &OrchestratorConfig) -> Self {
        let mut launcher = ExecutionLauncher::new(Arc::clone(&backend));
        if let Some(field) = &config.correlation_field {
            launcher = launcher.with_correlation_field(field);
        }

        Self {
            registry: DefinitionRegistry::new(Arc::clone(&backend), &config.execution_role),
            launcher,
            monitor: ExecutionMonitor::new(backend, config.monitor.clone()),
        }
    }

    /// Sends lifecycle events from all three components to `sink`.
    #[must_use]
    pub fn with_event_sink(self, sink: Arc<dyn EventSink>) -> Self {
        Self {
            registry: self.registry.with_event_sink(Arc::clone(&sink)),
            launcher: self.launcher.with_event_sink(Arc::clone(&sink)),
            monitor: self.monitor.with_event_sink(sink),
        }
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    /// Returns the launcher.
    #[must_use]
    pub fn launcher(&self) -> &ExecutionLauncher {
        &self.launcher
    }

    /// Returns the monitor.
    #[must_use]
    pub fn monitor(&self) -> &ExecutionMonitor {
        &self.monitor
    }

    /// Registers `definition`, starts one execution with `input`, and waits
    /// for it to settle.
    ///
    /// Nothing is retried. The first error ends the run and names the phase
    /// it came from.
    pub async fn run(
        &self,
        definition: WorkflowDefinition,
        input: Record,
    ) -> Result<RunReport, WorkflowError> {
        info!(workflow = %definition.name(), "Starting workflow run");
        let registered = self.registry.register(definition).await?;
        let mut execution = self.launcher.start(&registered, input).await?;
        let report = self.monitor.watch(&mut execution).await?;

        info!(
            workflow = %registered.definition().name(),
            execution = %execution.handle(),
            status = %execution.status(),
            attempts = report.attempts,
            "Workflow run finished"
        );

        Ok(RunReport {
            registered,
            execution,
            attempts: report.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::config::MonitorConfig;
    use crate::core::ExecutionStatus;
    use crate::errors::Phase;
    use crate::events::{event_types, CollectingEventSink};
    use crate::orders::{order_processing_definition, sample_order};
    use std::time::Duration;

    fn config() -> OrchestratorConfig {
        OrchestratorConfig::new("arn:role/exec").with_monitor(
            MonitorConfig::new()
                .with_poll_interval(Duration::from_millis(10))
                .with_max_attempts(5),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_order_workflow() {
        let sink = Arc::new(CollectingEventSink::new());
        let runner = WorkflowRunner::new(Arc::new(LocalBackend::new().with_running_polls(1)), &config())
            .with_event_sink(sink.clone());

        let report = runner
            .run(order_processing_definition().unwrap(), sample_order("order-7"))
            .await
            .unwrap();

        assert_eq!(report.execution.status(), ExecutionStatus::Succeeded);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.output().unwrap().get("status"), Some(&json!("SHIPPED")));
        assert_eq!(report.to_dict()["attempts"], json!(2));
        assert_eq!(
            sink.event_types(),
            vec![
                event_types::DEFINITION_REGISTERED,
                event_types::EXECUTION_STARTED,
                event_types::EXECUTION_POLLED,
                event_types::EXECUTION_POLLED,
                event_types::EXECUTION_SUCCEEDED,
            ]
        );
    }

    #[tokio::test]
    async fn test_run_surfaces_the_failing_phase() {
        let runner = WorkflowRunner::new(Arc::new(LocalBackend::new()), &OrchestratorConfig::new(" "));
        let err = runner
            .run(order_processing_definition().unwrap(), sample_order("o"))
            .await
            .unwrap_err();
        assert_eq!(err.phase(), Phase::Registration);

        let runner = WorkflowRunner::new(Arc::new(LocalBackend::new()), &config());
        let mut input = sample_order("o");
        input.remove("items");
        let err = runner
            .run(order_processing_definition().unwrap(), input)
            .await
            .unwrap_err();
        assert_eq!(err.phase(), Phase::Launch);
    }

    #[tokio::test]
    async fn test_correlation_field_from_config() {
        let runner = WorkflowRunner::new(
            Arc::new(LocalBackend::new()),
            &config().with_correlation_field("total"),
        );

        let report = runner
            .run(order_processing_definition().unwrap(), sample_order("o"))
            .await
            .unwrap();
        assert!(report.execution.launch_name().starts_with("execution-999_99-"));
    }
}
