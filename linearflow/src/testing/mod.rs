//! Testing utilities for linearflow runs.
//!
//! This module provides:
//! - A scripted orchestration backend that counts every call
//! - Assertions for executions, records, and errors

mod assertions;
mod mocks;

pub use assertions::{assert_error, assert_execution_status, assert_field};
pub use mocks::{
    RecordedLaunch, ScriptedBackend, SCRIPTED_DEFINITION_HANDLE, SCRIPTED_EXECUTION_HANDLE,
};
