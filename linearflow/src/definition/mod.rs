//! Workflow definitions.
//!
//! This module provides:
//! - The definition builder with structural validation
//! - The immutable, validated workflow definition
//! - The serialized document handed to the orchestration backend

mod builder;
mod document;
mod workflow;

pub use builder::DefinitionBuilder;
pub use document::{DefinitionDocument, StateDocument, PASS_STATE};
pub use workflow::{StageError, WorkflowDefinition};
