//! The serialized form of a workflow definition.
//!
//! The document is what the orchestration backend receives:
//!
//! ```json
//! {
//!   "Comment": "Order processing workflow",
//!   "StartAt": "ValidateOrder",
//!   "States": {
//!     "ValidateOrder": {
//!       "Type": "Pass",
//!       "Parameters": { "orderId.$": "$.orderId", "status": "VALIDATED" },
//!       "Next": "ShipOrder"
//!     },
//!     "ShipOrder": { "Type": "Pass", "End": true }
//!   }
//! }
//! ```

use crate::core::Record;
use crate::errors::MalformedDefinitionError;
use crate::stages::Successor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The only state type linearflow emits and understands.
pub const PASS_STATE: &str = "Pass";

/// Top-level definition document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DefinitionDocument {
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Name of the first state.
    pub start_at: String,
    /// All states, keyed by name.
    pub states: BTreeMap<String, StateDocument>,
}

/// A single state entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateDocument {
    /// The state type.
    #[serde(rename = "Type")]
    pub state_type: String,
    /// Transformation parameters.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub parameters: Record,
    /// The next state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    /// Whether this state ends the workflow.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub end: bool,
}

impl StateDocument {
    /// Creates a pass state.
    #[must_use]
    pub fn pass(parameters: Record, successor: &Successor) -> Self {
        Self {
            state_type: PASS_STATE.to_string(),
            parameters,
            next: successor.stage().map(str::to_string),
            end: successor.is_end(),
        }
    }

    /// Reads the successor, requiring exactly one of `Next` and `End`.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if both or neither are set.
    pub fn successor(&self) -> Result<Successor, String> {
        match (&self.next, self.end) {
            (Some(next), false) => Ok(Successor::next(next)),
            (None, true) => Ok(Successor::End),
            (Some(_), true) => Err("declares both Next and End".to_string()),
            (None, false) => Err("declares neither Next nor End".to_string()),
        }
    }
}

impl DefinitionDocument {
    /// Parses a document from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid definition document.
    pub fn from_json(text: &str) -> Result<Self, MalformedDefinitionError> {
        serde_json::from_str(text).map_err(|e| MalformedDefinitionError::invalid_document(e.to_string()))
    }

    /// Serializes the document to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
