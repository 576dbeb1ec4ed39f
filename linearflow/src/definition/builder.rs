//! Definition builder with validation.

use super::WorkflowDefinition;
use crate::errors::MalformedDefinitionError;
use crate::stages::{Stage, Successor, Transform};
use std::sync::Arc;

/// Builder for creating validated workflow definitions.
///
/// Stages may be added in any order; [`build`](Self::build) checks that they
/// form one chain. The start stage defaults to the first stage added.
#[derive(Debug, Clone)]
pub struct DefinitionBuilder {
    name: String,
    comment: Option<String>,
    start: Option<String>,
    stages: Vec<Stage>,
    required_fields: Vec<String>,
}

impl DefinitionBuilder {
    /// Creates a new definition builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: None,
            start: None,
            stages: Vec::new(),
            required_fields: Vec::new(),
        }
    }

    /// Creates a builder whose stages are linked in the order given, the last
    /// one being terminal.
    #[must_use]
    pub fn linear(
        name: impl Into<String>,
        entries: impl IntoIterator<Item = (String, Arc<dyn Transform>)>,
    ) -> Self {
        let entries: Vec<_> = entries.into_iter().collect();
        let mut builder = Self::new(name);

        for (position, (stage_name, transform)) in entries.iter().enumerate() {
            let successor = entries
                .get(position + 1)
                .map_or(Successor::End, |(next, _)| Successor::next(next));
            builder = builder.stage(stage_name, Arc::clone(transform), successor);
        }

        builder
    }

    /// Sets the comment carried into the serialized document.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets the start stage.
    #[must_use]
    pub fn start_at(mut self, stage: impl Into<String>) -> Self {
        self.start = Some(stage.into());
        self
    }

    /// Adds a stage.
    #[must_use]
    pub fn stage(
        self,
        name: impl Into<String>,
        transform: Arc<dyn Transform>,
        successor: Successor,
    ) -> Self {
        self.add_stage(Stage::new(name, transform, successor))
    }

    /// Adds a stage that ends the workflow.
    #[must_use]
    pub fn terminal(self, name: impl Into<String>, transform: Arc<dyn Transform>) -> Self {
        self.stage(name, transform, Successor::End)
    }

    /// Adds a fully configured stage.
    #[must_use]
    pub fn add_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Requires a field in every execution input.
    #[must_use]
    pub fn require(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.required_fields.contains(&field) {
            self.required_fields.push(field);
        }
        self
    }

    /// Requires several fields, in order.
    #[must_use]
    pub fn require_fields(self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        fields
            .into_iter()
            .fold(self, |builder, field| builder.require(field))
    }

    /// Returns the definition name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the definition.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate stage names, unknown successors, cycles,
    /// more than one terminal stage, an unknown start stage, stages that are
    /// not on the path from the start stage, or an empty builder.
    pub fn build(self) -> Result<WorkflowDefinition, MalformedDefinitionError> {
        let start = match (self.start, self.stages.first()) {
            (Some(start), _) => start,
            (None, Some(first)) => first.name().to_string(),
            (None, None) => return Err(MalformedDefinitionError::empty()),
        };

        WorkflowDefinition::from_parts(
            self.name,
            self.comment,
            start,
            self.stages,
            self.required_fields,
        )
    }
}
