//! The validated, immutable workflow definition.

use super::document::{DefinitionDocument, StateDocument, PASS_STATE};
use crate::core::Record;
use crate::errors::MalformedDefinitionError;
use crate::stages::{PassTransform, Stage, Successor, TransformError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Error raised when a stage transform fails during a local run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Stage '{stage}' failed: {source}")]
pub struct StageError {
    /// The failing stage.
    pub stage: String,
    /// The transform error.
    #[source]
    pub source: TransformError,
}

/// A linear workflow: one path from the start stage to the terminal stage.
///
/// Built through [`DefinitionBuilder`](super::DefinitionBuilder) or parsed
/// from a [`DefinitionDocument`]; both routes validate that the stages form a
/// single connected, acyclic chain.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    name: String,
    comment: Option<String>,
    start: String,
    stages: Vec<Stage>,
    index: HashMap<String, usize>,
    path: Vec<usize>,
    terminal: usize,
    required_fields: Vec<String>,
}

impl WorkflowDefinition {
    pub(crate) fn from_parts(
        name: String,
        comment: Option<String>,
        start: String,
        stages: Vec<Stage>,
        required_fields: Vec<String>,
    ) -> Result<Self, MalformedDefinitionError> {
        let (index, path) = validate_chain(&start, &stages)?;
        let terminal = path[path.len() - 1];

        Ok(Self {
            name,
            comment,
            start,
            stages,
            index,
            path,
            terminal,
            required_fields,
        })
    }

    /// Rebuilds a definition from its serialized document.
    ///
    /// Required input fields are not part of the document and start empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a state is not a pass state, declares an invalid
    /// successor, or the resulting stages are not a single linear chain.
    pub fn from_document(
        name: impl Into<String>,
        document: &DefinitionDocument,
    ) -> Result<Self, MalformedDefinitionError> {
        let mut stages = Vec::with_capacity(document.states.len());

        for (state_name, state) in &document.states {
            if state.state_type != PASS_STATE {
                return Err(MalformedDefinitionError::invalid_document(format!(
                    "state '{state_name}' has unsupported type '{}'",
                    state.state_type
                )));
            }
            let successor = state.successor().map_err(|reason| {
                MalformedDefinitionError::invalid_document(format!("state '{state_name}' {reason}"))
            })?;
            let transform = PassTransform::from_parameters(&state.parameters).map_err(|reason| {
                MalformedDefinitionError::invalid_document(format!("state '{state_name}': {reason}"))
            })?;
            stages.push(Stage::new(state_name.clone(), Arc::new(transform), successor));
        }

        Self::from_parts(
            name.into(),
            document.comment.clone(),
            document.start_at.clone(),
            stages,
            Vec::new(),
        )
    }

    /// Returns the definition name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the comment, if any.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Returns the name of the start stage.
    #[must_use]
    pub fn start_stage(&self) -> &str {
        &self.start
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Looks up a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.index.get(name).map(|&i| &self.stages[i])
    }

    /// Iterates stages in declaration order.
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter()
    }

    /// Iterates stages in execution order, from the start stage to the
    /// terminal stage.
    pub fn walk(&self) -> impl Iterator<Item = &Stage> {
        self.path.iter().map(|&i| &self.stages[i])
    }

    /// Returns the stage that ends the workflow.
    #[must_use]
    pub fn terminal_stage(&self) -> &Stage {
        &self.stages[self.terminal]
    }

    /// Returns the fields every execution input must carry, in declaration order.
    #[must_use]
    pub fn required_input_fields(&self) -> &[String] {
        &self.required_fields
    }

    /// Runs every transform in execution order against `input`.
    ///
    /// # Errors
    ///
    /// Returns the first stage whose transform fails or drops a field it
    /// received.
    pub fn run_locally(&self, input: &Record) -> Result<Record, StageError> {
        let mut record = input.clone();

        for stage in self.walk() {
            let output = stage.transform().apply(&record).map_err(|source| StageError {
                stage: stage.name().to_string(),
                source,
            })?;

            if let Some(field) = record.keys().find(|key| !output.contains_key(*key)) {
                return Err(StageError {
                    stage: stage.name().to_string(),
                    source: TransformError::RemovedField {
                        field: field.clone(),
                    },
                });
            }

            record = output;
        }

        Ok(record)
    }

    /// Renders the serialized document.
    #[must_use]
    pub fn to_document(&self) -> DefinitionDocument {
        let states: BTreeMap<String, StateDocument> = self
            .stages
            .iter()
            .map(|stage| {
                (
                    stage.name().to_string(),
                    StateDocument::pass(stage.transform().parameters(), stage.successor()),
                )
            })
            .collect();

        DefinitionDocument {
            comment: self.comment.clone(),
            start_at: self.start.clone(),
            states,
        }
    }

    /// Renders the serialized document as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        self.to_document().to_json()
    }
}

/// Checks that `stages` form one chain from `start` to a single terminal
/// stage, returning the name index and the path as stage positions.
fn validate_chain(
    start: &str,
    stages: &[Stage],
) -> Result<(HashMap<String, usize>, Vec<usize>), MalformedDefinitionError> {
    if stages.is_empty() {
        return Err(MalformedDefinitionError::empty());
    }

    let mut index = HashMap::with_capacity(stages.len());
    for (position, stage) in stages.iter().enumerate() {
        if index.insert(stage.name().to_string(), position).is_some() {
            return Err(MalformedDefinitionError::duplicate(stage.name()));
        }
    }

    for stage in stages {
        if let Successor::Next(next) = stage.successor() {
            if next == stage.name() {
                return Err(MalformedDefinitionError::cycle(vec![next.clone(), next.clone()]));
            }
            if !index.contains_key(next) {
                return Err(MalformedDefinitionError::unknown_successor(stage.name(), next));
            }
        }
    }

    let terminals: Vec<String> = stages
        .iter()
        .filter(|stage| stage.is_terminal())
        .map(|stage| stage.name().to_string())
        .collect();
    if terminals.len() > 1 {
        return Err(MalformedDefinitionError::ambiguous_terminal(terminals));
    }

    let mut position = *index
        .get(start)
        .ok_or_else(|| MalformedDefinitionError::unknown_start(start))?;
    let mut visited = vec![false; stages.len()];
    let mut path: Vec<usize> = Vec::with_capacity(stages.len());

    loop {
        if visited[position] {
            let from = path.iter().position(|&p| p == position).unwrap_or(0);
            let mut cycle: Vec<String> = path[from..]
                .iter()
                .map(|&p| stages[p].name().to_string())
                .collect();
            cycle.push(stages[position].name().to_string());
            return Err(MalformedDefinitionError::cycle(cycle));
        }
        visited[position] = true;
        path.push(position);

        match stages[position].successor() {
            Successor::Next(next) => position = index[next.as_str()],
            Successor::End => break,
        }
    }

    if path.len() < stages.len() {
        let unreachable = stages
            .iter()
            .zip(&visited)
            .filter(|(_, &seen)| !seen)
            .map(|(stage, _)| stage.name().to_string())
            .collect();
        return Err(MalformedDefinitionError::unreachable(unreachable));
    }

    Ok((index, path))
}
