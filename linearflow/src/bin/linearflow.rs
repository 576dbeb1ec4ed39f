//! Runs the order processing workflow against the in-process backend and
//! prints the run report as JSON.

use anyhow::Context;
use linearflow::backend::LocalBackend;
use linearflow::config::OrchestratorConfig;
use linearflow::orchestrator::WorkflowRunner;
use linearflow::orders::{order_processing_definition, sample_order};
use linearflow::utils::generate_uuid;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOCAL_EXECUTION_ROLE: &str = "arn:linearflow:role/local-execution";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config =
        OrchestratorConfig::from_env_or_role(LOCAL_EXECUTION_ROLE).context("invalid configuration")?;

    let backend = Arc::new(LocalBackend::new().with_running_polls(2));
    let runner = WorkflowRunner::new(backend, &config);

    let definition = order_processing_definition()?;
    let order_id = format!("order-{}", generate_uuid().simple());
    let report = runner
        .run(definition, sample_order(&order_id))
        .await
        .context("order workflow run failed")?;

    println!("{}", serde_json::to_string_pretty(&report.to_dict())?);
    Ok(())
}
