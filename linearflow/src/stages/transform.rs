//! Stage transforms.
//!
//! A transform maps the record a stage receives to the record it hands to its
//! successor. Transforms are pure and never perform I/O. Within a workflow a
//! stage may add or overwrite fields but never drop one.

use crate::core::{has_field, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use thiserror::Error;

/// Suffix marking a parameter whose value is a path into the input.
const PATH_SUFFIX: &str = ".$";

/// Errors raised while applying a transform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// A forwarded field was not present in the input.
    #[error("path '$.{field}' not found in input")]
    MissingField {
        /// The missing field.
        field: String,
    },

    /// The transform dropped a field it received.
    #[error("field '{field}' was removed")]
    RemovedField {
        /// The removed field.
        field: String,
    },

    /// The transform failed for another reason.
    #[error("{0}")]
    Failed(String),
}

/// Trait for stage transforms.
pub trait Transform: Send + Sync + Debug {
    /// Applies the transform to `input`.
    fn apply(&self, input: &Record) -> Result<Record, TransformError>;

    /// Returns the declarative parameters describing this transform.
    ///
    /// Forwarded fields are rendered as `"field.$": "$.field"`, literal
    /// assignments as `"field": value`.
    fn parameters(&self) -> Record;
}

/// A declarative transform that forwards input fields and assigns literals.
///
/// The output holds exactly the forwarded fields and the assigned literals,
/// which is how a `Pass` state with `Parameters` behaves. A transform with
/// neither is the identity, like a `Pass` state without `Parameters`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassTransform {
    /// Fields that must be present in the input and are carried forward.
    #[serde(default)]
    pub forward: Vec<String>,
    /// Literal values written into the output.
    #[serde(default)]
    pub assign: Record,
}

impl PassTransform {
    /// Creates an empty pass transform (identity).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwards a field from the input.
    #[must_use]
    pub fn forward(mut self, field: impl Into<String>) -> Self {
        self.forward.push(field.into());
        self
    }

    /// Forwards several fields from the input.
    #[must_use]
    pub fn forwarding(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.forward.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Assigns a literal value in the output.
    #[must_use]
    pub fn assign(mut self, field: impl Into<String>, value: Value) -> Self {
        self.assign.insert(field.into(), value);
        self
    }

    /// Rebuilds a pass transform from its declarative parameters.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if a path parameter is not a
    /// same-name reference of the form `"field.$": "$.field"`.
    pub fn from_parameters(parameters: &Record) -> Result<Self, String> {
        let mut transform = Self::new();

        for (key, value) in parameters {
            if let Some(field) = key.strip_suffix(PATH_SUFFIX) {
                let expected = format!("$.{field}");
                match value.as_str() {
                    Some(path) if path == expected => transform.forward.push(field.to_string()),
                    Some(path) => {
                        return Err(format!(
                            "parameter '{key}' maps path '{path}', only '{expected}' is supported"
                        ))
                    }
                    None => return Err(format!("parameter '{key}' must be a path string")),
                }
            } else {
                transform.assign.insert(key.clone(), value.clone());
            }
        }

        Ok(transform)
    }
}

impl Transform for PassTransform {
    fn apply(&self, input: &Record) -> Result<Record, TransformError> {
        if let Some(field) = self.forward.iter().find(|field| !has_field(input, field)) {
            return Err(TransformError::MissingField {
                field: field.clone(),
            });
        }

        if self.forward.is_empty() && self.assign.is_empty() {
            return Ok(input.clone());
        }

        let mut output: Record = self
            .forward
            .iter()
            .filter_map(|field| input.get(field).map(|value| (field.clone(), value.clone())))
            .collect();
        for (key, value) in &self.assign {
            output.insert(key.clone(), value.clone());
        }
        Ok(output)
    }

    fn parameters(&self) -> Record {
        let mut parameters = Record::new();
        for field in &self.forward {
            parameters.insert(
                format!("{field}{PATH_SUFFIX}"),
                Value::String(format!("$.{field}")),
            );
        }
        for (key, value) in &self.assign {
            parameters.insert(key.clone(), value.clone());
        }
        parameters
    }
}

/// A closure-based transform.
///
/// Closure transforms run locally only: their parameters are empty, so a
/// backend interpreting the serialized document sees them as identity steps.
pub struct FnTransform<F>
where
    F: Fn(&Record) -> Result<Record, TransformError> + Send + Sync,
{
    func: F,
}

impl<F> FnTransform<F>
where
    F: Fn(&Record) -> Result<Record, TransformError> + Send + Sync,
{
    /// Creates a new closure-based transform.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnTransform<F>
where
    F: Fn(&Record) -> Result<Record, TransformError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTransform").finish_non_exhaustive()
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&Record) -> Result<Record, TransformError> + Send + Sync,
{
    fn apply(&self, input: &Record) -> Result<Record, TransformError> {
        (self.func)(input)
    }

    fn parameters(&self) -> Record {
        Record::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record_from_value;
    use serde_json::json;

    fn record(value: Value) -> Record {
        record_from_value(value).unwrap()
    }

    #[test]
    fn test_pass_transform_outputs_forwarded_and_assigned_fields() {
        let transform = PassTransform::new()
            .forwarding(["orderId", "total"])
            .assign("status", json!("VALIDATED"));

        let output = transform
            .apply(&record(json!({"orderId": "o-1", "total": 5, "note": "x"})))
            .unwrap();

        assert_eq!(
            output,
            record(json!({"orderId": "o-1", "total": 5, "status": "VALIDATED"}))
        );
    }

    #[test]
    fn test_pass_transform_output_matches_its_parameters() {
        let transform = PassTransform::new()
            .forward("orderId")
            .assign("status", json!("SHIPPED"));
        let input = record(json!({"orderId": "o-1", "items": ["a"], "status": "NEW"}));

        let output = transform.apply(&input).unwrap();

        // Each output key is a parameter key with the `.$` suffix removed.
        let mut parameter_keys: Vec<String> = transform
            .parameters()
            .keys()
            .map(|key| key.strip_suffix(PATH_SUFFIX).unwrap_or(key).to_string())
            .collect();
        parameter_keys.sort();
        let mut output_keys: Vec<String> = output.keys().cloned().collect();
        output_keys.sort();
        assert_eq!(output_keys, parameter_keys);
        assert_eq!(output.get("status"), Some(&json!("SHIPPED")));
    }

    #[test]
    fn test_empty_pass_transform_is_identity() {
        let input = record(json!({"orderId": "o-1", "note": "x"}));
        assert_eq!(PassTransform::new().apply(&input), Ok(input));
    }

    #[test]
    fn test_pass_transform_missing_forwarded_field() {
        let transform = PassTransform::new().forward("orderId");
        let err = transform.apply(&record(json!({}))).unwrap_err();

        assert_eq!(
            err,
            TransformError::MissingField {
                field: "orderId".to_string()
            }
        );
    }

    #[test]
    fn test_parameters_render_paths_and_literals() {
        let transform = PassTransform::new()
            .forward("orderId")
            .assign("trackingNumber", json!("TRACK123"));

        let parameters = transform.parameters();
        assert_eq!(parameters.get("orderId.$"), Some(&json!("$.orderId")));
        assert_eq!(parameters.get("trackingNumber"), Some(&json!("TRACK123")));
    }

    #[test]
    fn test_from_parameters_rejects_renames() {
        let parameters = record(json!({"orderId.$": "$.id"}));
        assert!(PassTransform::from_parameters(&parameters).is_err());

        let parameters = record(json!({"orderId.$": 7}));
        assert!(PassTransform::from_parameters(&parameters).is_err());
    }

    #[test]
    fn test_from_parameters_rebuilds_transform() {
        let original = PassTransform::new()
            .forwarding(["orderId", "items"])
            .assign("status", json!("SHIPPED"));

        let rebuilt = PassTransform::from_parameters(&original.parameters()).unwrap();
        let input = record(json!({"orderId": "o-1", "items": []}));
        assert_eq!(rebuilt.apply(&input), original.apply(&input));
    }

    #[test]
    fn test_fn_transform() {
        let transform = FnTransform::new(|input: &Record| {
            let mut output = input.clone();
            output.insert("seen".to_string(), json!(true));
            Ok(output)
        });

        let output = transform.apply(&Record::new()).unwrap();
        assert_eq!(output.get("seen"), Some(&json!(true)));
        assert!(transform.parameters().is_empty());
    }
}
