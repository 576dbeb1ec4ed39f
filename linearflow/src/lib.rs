//! # Linearflow
//!
//! Orchestration of linear step-function workflows on an external backend.
//!
//! A workflow is a chain of named stages, each a data transform with a single
//! successor, ending at one terminal stage. Linearflow provides:
//!
//! - **Definition model**: build and validate a linear chain, serialize it to
//!   a state-machine document and parse it back
//! - **Registration**: register a definition with the backend under a unique
//!   name and execution role, and verify what the backend stored
//! - **Launch**: validate required input fields and start an execution
//! - **Monitoring**: a bounded polling loop with a stop request on
//!   exhaustion and a postcondition check on success
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use linearflow::prelude::*;
//! use std::sync::Arc;
//!
//! let runner = WorkflowRunner::new(
//!     Arc::new(LocalBackend::new()),
//!     &OrchestratorConfig::new("arn:role/exec"),
//! );
//!
//! let report = runner
//!     .run(order_processing_definition()?, sample_order("order-1"))
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod config;
pub mod core;
pub mod definition;
pub mod errors;
pub mod events;
pub mod launcher;
pub mod monitor;
pub mod orchestrator;
pub mod orders;
pub mod queue;
pub mod registry;
pub mod stages;
pub mod storage;
pub mod testing;
pub mod utils;


/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{DescribeResponse, LocalBackend, OrchestrationBackend};
    pub use crate::config::{MonitorConfig, OrchestratorConfig};
    pub use crate::core::{ExecutionStatus, Record};
    pub use crate::definition::{DefinitionBuilder, DefinitionDocument, WorkflowDefinition};
    pub use crate::errors::{
        BackendError, MalformedDefinitionError, Phase, WorkflowError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::launcher::{Execution, ExecutionLauncher};
    pub use crate::monitor::{ExecutionMonitor, PollOutcome, PollReport};
    pub use crate::orchestrator::{RunReport, WorkflowRunner};
    pub use crate::orders::{order_input, order_processing_definition, sample_order};
    pub use crate::registry::{DefinitionRegistry, RegisteredDefinition};
    pub use crate::stages::{
        AllOf, FieldEquals, FnTransform, NonEmptyString, PassTransform, Postcondition, Stage,
        Successor, Transform,
    };
    pub use crate::utils::{generate_uuid, iso_timestamp, Timestamp};
}
