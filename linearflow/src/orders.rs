//! The order processing workflow.
//!
//! Four pass stages carry an order from validation to shipping:
//! `ValidateOrder -> ProcessPayment -> FulfillOrder -> ShipOrder`. Each stage
//! forwards the order fields and stamps a status; shipping also attaches a
//! tracking number and is checked on success.

use crate::core::Record;
use crate::definition::{DefinitionBuilder, WorkflowDefinition};
use crate::errors::MalformedDefinitionError;
use crate::stages::{AllOf, FieldEquals, NonEmptyString, PassTransform, Stage, Successor};
use serde_json::{json, Value};
use std::sync::Arc;

/// Definition name used at registration.
pub const ORDER_WORKFLOW_NAME: &str = "order-processing";

/// Fields every order must carry.
pub const ORDER_FIELDS: [&str; 3] = ["orderId", "items", "total"];

/// Status stamped by the shipping stage.
pub const SHIPPED: &str = "SHIPPED";

/// Tracking number attached by the shipping stage.
pub const TRACKING_NUMBER: &str = "TRACK123";

/// Builds the order processing definition.
pub fn order_processing_definition() -> Result<WorkflowDefinition, MalformedDefinitionError> {
    let stage = |status: &str| -> Arc<PassTransform> {
        Arc::new(
            PassTransform::new()
                .forwarding(ORDER_FIELDS)
                .assign("status", json!(status)),
        )
    };

    let ship = PassTransform::new()
        .forwarding(ORDER_FIELDS)
        .assign("status", json!(SHIPPED))
        .assign("trackingNumber", json!(TRACKING_NUMBER));
    let shipped = AllOf::new()
        .with(FieldEquals::new("status", json!(SHIPPED)))
        .with(NonEmptyString::new("trackingNumber"));

    DefinitionBuilder::new(ORDER_WORKFLOW_NAME)
        .comment("Order processing workflow")
        .stage("ValidateOrder", stage("VALIDATED"), Successor::next("ProcessPayment"))
        .stage("ProcessPayment", stage("PAYMENT_PROCESSED"), Successor::next("FulfillOrder"))
        .stage("FulfillOrder", stage("FULFILLED"), Successor::next("ShipOrder"))
        .add_stage(
            Stage::new("ShipOrder", Arc::new(ship), Successor::End)
                .with_postcondition(Arc::new(shipped)),
        )
        .require_fields(ORDER_FIELDS)
        .build()
}

/// Builds an order input record.
#[must_use]
pub fn order_input(order_id: &str, items: &[&str], total: f64) -> Record {
    let mut record = Record::new();
    record.insert("orderId".to_string(), json!(order_id));
    record.insert(
        "items".to_string(),
        Value::Array(items.iter().map(|item| json!(item)).collect()),
    );
    record.insert("total".to_string(), json!(total));
    record
}

/// The demo order: three items worth 999.99.
#[must_use]
pub fn sample_order(order_id: &str) -> Record {
    order_input(order_id, &["laptop", "mouse", "keyboard"], 999.99)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stage_order_and_requirements() {
        let definition = order_processing_definition().unwrap();

        let walked: Vec<&str> = definition.walk().map(Stage::name).collect();
        assert_eq!(
            walked,
            vec!["ValidateOrder", "ProcessPayment", "FulfillOrder", "ShipOrder"]
        );
        assert_eq!(definition.required_input_fields(), ORDER_FIELDS);
        assert!(definition.terminal_stage().postcondition().is_some());
    }

    #[test]
    fn test_local_run_ships_the_order() {
        let definition = order_processing_definition().unwrap();
        let input = order_input("order-1", &["a", "b"], 10.0);

        let output = definition.run_locally(&input).unwrap();

        assert_eq!(output.get("status"), Some(&json!("SHIPPED")));
        assert_eq!(output.get("trackingNumber"), Some(&json!("TRACK123")));
        assert_eq!(output.get("items"), Some(&json!(["a", "b"])));
        assert!(definition
            .terminal_stage()
            .postcondition()
            .unwrap()
            .check(&output)
            .is_ok());
    }

    #[test]
    fn test_local_run_outputs_only_order_fields() {
        let definition = order_processing_definition().unwrap();
        let output = definition.run_locally(&sample_order("order-1")).unwrap();

        let mut keys: Vec<&str> = output.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["items", "orderId", "status", "total", "trackingNumber"]);

        let mut input = sample_order("order-1");
        input.insert("note".to_string(), json!("gift"));
        let err = definition.run_locally(&input).unwrap_err();
        assert_eq!(err.stage, "ValidateOrder");
        assert_eq!(
            err.source,
            crate::stages::TransformError::RemovedField {
                field: "note".to_string()
            }
        );
    }

    #[test]
    fn test_postcondition_rejects_missing_tracking_number() {
        let definition = order_processing_definition().unwrap();
        let mut output = order_input("order-1", &["a"], 1.0);
        output.insert("status".to_string(), json!("SHIPPED"));

        let failure = definition
            .terminal_stage()
            .postcondition()
            .unwrap()
            .check(&output)
            .unwrap_err();
        assert_eq!(failure.field, "trackingNumber");
    }

    #[test]
    fn test_serialized_parameters() {
        let document = order_processing_definition().unwrap().to_document();
        let ship = &document.states["ShipOrder"];

        assert!(ship.end);
        assert_eq!(ship.parameters.get("orderId.$"), Some(&json!("$.orderId")));
        assert_eq!(ship.parameters.get("trackingNumber"), Some(&json!("TRACK123")));
        assert_eq!(
            document.states["ValidateOrder"].next.as_deref(),
            Some("ProcessPayment")
        );
    }

    #[test]
    fn test_sample_order() {
        let order = sample_order("order-42");
        assert_eq!(order.get("total"), Some(&json!(999.99)));
        assert_eq!(order.get("items").and_then(Value::as_array).map(Vec::len), Some(3));
    }
}
