//! Stages and their building blocks.
//!
//! A stage is one named step of a workflow: a pure [`Transform`], a declared
//! [`Successor`], and optionally a [`Postcondition`] checked when the stage is
//! the last one of a successful execution.

mod postcondition;
mod transform;

pub use postcondition::{AllOf, FieldEquals, NonEmptyString, Postcondition, PostconditionFailure};
pub use transform::{FnTransform, PassTransform, Transform, TransformError};

use std::fmt;
use std::sync::Arc;

/// What follows a stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Successor {
    /// Continue with the named stage.
    Next(String),
    /// The workflow ends after this stage.
    End,
}

impl Successor {
    /// Creates a successor pointing at `stage`.
    #[must_use]
    pub fn next(stage: impl Into<String>) -> Self {
        Self::Next(stage.into())
    }

    /// Returns the next stage name, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Next(name) => Some(name),
            Self::End => None,
        }
    }

    /// Returns true if this is the terminal marker.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for Successor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next(name) => write!(f, "{name}"),
            Self::End => write!(f, "<end>"),
        }
    }
}

/// A single named step of a workflow.
#[derive(Debug, Clone)]
pub struct Stage {
    name: String,
    transform: Arc<dyn Transform>,
    successor: Successor,
    postcondition: Option<Arc<dyn Postcondition>>,
}

impl Stage {
    /// Creates a new stage.
    #[must_use]
    pub fn new(name: impl Into<String>, transform: Arc<dyn Transform>, successor: Successor) -> Self {
        Self {
            name: name.into(),
            transform,
            successor,
            postcondition: None,
        }
    }

    /// Attaches a postcondition checked when this stage ends a successful run.
    #[must_use]
    pub fn with_postcondition(mut self, postcondition: Arc<dyn Postcondition>) -> Self {
        self.postcondition = Some(postcondition);
        self
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the transform.
    #[must_use]
    pub fn transform(&self) -> &dyn Transform {
        self.transform.as_ref()
    }

    /// Returns the successor.
    #[must_use]
    pub fn successor(&self) -> &Successor {
        &self.successor
    }

    /// Returns the postcondition, if any.
    #[must_use]
    pub fn postcondition(&self) -> Option<&dyn Postcondition> {
        self.postcondition.as_deref()
    }

    /// Returns true if this stage ends the workflow.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.successor.is_end()
    }
}
