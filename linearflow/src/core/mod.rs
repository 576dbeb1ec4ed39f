//! Core domain model types for linearflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Execution status as reported by the orchestration backend
//! - Records flowing between stages

mod record;
mod status;

pub use record::{first_missing_field, has_field, record_from_value, Record};
pub use status::{ExecutionStatus, UnknownStatusError};
