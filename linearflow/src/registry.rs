//! Definition registration.
//!
//! The [`DefinitionRegistry`] is the only component that creates anything on
//! the backend's definition side. Registration is not idempotent: every call
//! submits a fresh, uniquely named definition.

use crate::backend::OrchestrationBackend;
use crate::definition::{DefinitionDocument, WorkflowDefinition};
use crate::errors::WorkflowError;
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::utils::{next_sequence, now_utc, unix_millis, Timestamp};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A definition accepted by the backend.
///
/// Never mutated after registration.
#[derive(Debug, Clone)]
pub struct RegisteredDefinition {
    handle: String,
    registration_name: String,
    execution_role: String,
    fingerprint: String,
    registered_at: Timestamp,
    definition: Arc<WorkflowDefinition>,
}

impl RegisteredDefinition {
    /// Returns the opaque handle issued by the backend.
    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Returns the unique name the definition was registered under.
    #[must_use]
    pub fn registration_name(&self) -> &str {
        &self.registration_name
    }

    /// Returns the execution role reference.
    #[must_use]
    pub fn execution_role(&self) -> &str {
        &self.execution_role
    }

    /// Returns the SHA-256 hex digest of the submitted document.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Returns when the backend accepted the definition.
    #[must_use]
    pub fn registered_at(&self) -> Timestamp {
        self.registered_at
    }

    /// Returns the local definition.
    #[must_use]
    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// Returns a shared handle to the local definition.
    #[must_use]
    pub fn shared_definition(&self) -> Arc<WorkflowDefinition> {
        Arc::clone(&self.definition)
    }
}

/// Registers definitions with an orchestration backend.
pub struct DefinitionRegistry {
    backend: Arc<dyn OrchestrationBackend>,
    execution_role: String,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for DefinitionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionRegistry")
            .field("execution_role", &self.execution_role)
            .finish_non_exhaustive()
    }
}

impl DefinitionRegistry {
    /// Creates a registry that registers under `execution_role`.
    #[must_use]
    pub fn new(backend: Arc<dyn OrchestrationBackend>, execution_role: impl Into<String>) -> Self {
        Self {
            backend,
            execution_role: execution_role.into(),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the execution role reference.
    #[must_use]
    pub fn execution_role(&self) -> &str {
        &self.execution_role
    }

    /// Registers `definition` with the backend.
    ///
    /// Makes exactly one backend call. Fails with
    /// [`WorkflowError::RegistrationFailed`] if the call errors or returns no
    /// handle.
    pub async fn register(
        &self,
        definition: WorkflowDefinition,
    ) -> Result<RegisteredDefinition, WorkflowError> {
        let now = now_utc();
        let sequence = next_sequence();
        let registration_name = format!("{}-{}-{sequence}", definition.name(), unix_millis(&now));

        let document = definition.to_json().map_err(|e| {
            WorkflowError::registration_failed(
                &registration_name,
                format!("definition could not be serialized: {e}"),
                None,
            )
        })?;

        info!(
            name = %registration_name,
            stages = definition.stage_count(),
            "Registering workflow definition"
        );

        let response = match self
            .backend
            .register(&registration_name, &document, &self.execution_role)
            .await
        {
            Ok(response) => response,
            Err(source) => {
                warn!(name = %registration_name, error = %source, "Backend rejected registration");
                self.emit_failure(&registration_name, &source.to_string()).await;
                return Err(WorkflowError::registration_failed(
                    registration_name,
                    "backend rejected the registration",
                    Some(source),
                ));
            }
        };

        let Some(handle) = response.definition_handle.filter(|h| !h.is_empty()) else {
            self.emit_failure(&registration_name, "no definition handle").await;
            return Err(WorkflowError::registration_failed(
                registration_name,
                "backend returned no definition handle",
                None,
            ));
        };

        let fingerprint = fingerprint(&document);
        info!(name = %registration_name, handle = %handle, "Workflow definition registered");
        self.event_sink
            .emit(
                event_types::DEFINITION_REGISTERED,
                Some(json!({
                    "name": registration_name,
                    "handle": handle,
                    "fingerprint": fingerprint,
                })),
            )
            .await;

        Ok(RegisteredDefinition {
            handle,
            registration_name,
            execution_role: self.execution_role.clone(),
            fingerprint,
            registered_at: now,
            definition: Arc::new(definition),
        })
    }

    /// Checks that the backend's stored copy matches the local definition.
    ///
    /// The role must match, and the stored document must name the same start
    /// stage and carry exactly the local stages with the same successors.
    pub async fn verify(&self, registered: &RegisteredDefinition) -> Result<(), WorkflowError> {
        let name = registered.registration_name();
        let description = self
            .backend
            .describe_definition(registered.handle())
            .await
            .map_err(|source| {
                WorkflowError::registration_failed(
                    name,
                    "stored definition could not be described",
                    Some(source),
                )
            })?;

        if description.role != registered.execution_role {
            return Err(mismatch(
                name,
                format!(
                    "execution role is '{}', expected '{}'",
                    description.role, registered.execution_role
                ),
            ));
        }

        if fingerprint(&description.document) == registered.fingerprint {
            debug!(name = %name, "Stored definition matches by fingerprint");
        } else {
            let document = DefinitionDocument::from_json(&description.document)
                .map_err(|e| mismatch(name, e.to_string()))?;
            compare_document(registered.definition(), &document).map_err(|r| mismatch(name, r))?;
        }

        self.event_sink
            .emit(
                event_types::DEFINITION_VERIFIED,
                Some(json!({"name": name, "handle": registered.handle()})),
            )
            .await;
        Ok(())
    }

    async fn emit_failure(&self, name: &str, reason: &str) {
        self.event_sink
            .emit(
                event_types::DEFINITION_REGISTRATION_FAILED,
                Some(json!({"name": name, "reason": reason})),
            )
            .await;
    }
}

fn fingerprint(document: &str) -> String {
    hex::encode(Sha256::digest(document.as_bytes()))
}

fn mismatch(name: &str, reason: impl Into<String>) -> WorkflowError {
    let reason = reason.into();
    warn!(name = %name, reason = %reason, "Stored definition does not match");
    WorkflowError::registration_failed(name, format!("stored definition mismatch: {reason}"), None)
}

fn compare_document(
    definition: &WorkflowDefinition,
    document: &DefinitionDocument,
) -> Result<(), String> {
    if document.start_at != definition.start_stage() {
        return Err(format!(
            "start stage is '{}', expected '{}'",
            document.start_at,
            definition.start_stage()
        ));
    }

    for stage in definition.stages() {
        let state = document
            .states
            .get(stage.name())
            .ok_or_else(|| format!("stage '{}' is missing", stage.name()))?;
        let successor = state
            .successor()
            .map_err(|reason| format!("stage '{}' {reason}", stage.name()))?;
        if &successor != stage.successor() {
            return Err(format!(
                "stage '{}' continues to {successor}, expected {}",
                stage.name(),
                stage.successor()
            ));
        }
        if state.parameters != stage.transform().parameters() {
            return Err(format!("stage '{}' parameters differ", stage.name()));
        }
    }

    if let Some(extra) = document
        .states
        .keys()
        .find(|name| definition.stage(name).is_none())
    {
        return Err(format!("unexpected stage '{extra}'"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        DefinitionDescription, LocalBackend, MockOrchestrationBackend, RegisterResponse,
    };
    use crate::errors::{BackendError, Phase};
    use crate::events::CollectingEventSink;
    use crate::orders::order_processing_definition;

    fn registry(backend: impl OrchestrationBackend + 'static) -> DefinitionRegistry {
        DefinitionRegistry::new(Arc::new(backend), "arn:role/exec")
    }

    #[tokio::test]
    async fn test_register_stores_handle_and_definition() {
        let sink = Arc::new(CollectingEventSink::new());
        let registry = registry(LocalBackend::new()).with_event_sink(sink.clone());

        let registered = registry.register(order_processing_definition().unwrap()).await.unwrap();

        assert!(!registered.handle().is_empty());
        assert!(registered.registration_name().starts_with("order-processing-"));
        assert_eq!(registered.execution_role(), "arn:role/exec");
        assert_eq!(registered.fingerprint().len(), 64);
        assert_eq!(registered.definition().start_stage(), "ValidateOrder");
        assert_eq!(sink.event_types(), vec![event_types::DEFINITION_REGISTERED]);
    }

    #[tokio::test]
    async fn test_register_twice_creates_two_registrations() {
        let backend = Arc::new(LocalBackend::new());
        let registry = DefinitionRegistry::new(backend.clone(), "role");

        let first = registry.register(order_processing_definition().unwrap()).await.unwrap();
        let second = registry.register(order_processing_definition().unwrap()).await.unwrap();

        assert_ne!(first.registration_name(), second.registration_name());
        assert_ne!(first.handle(), second.handle());
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(backend.definition_count(), 2);
    }

    #[tokio::test]
    async fn test_fresh_registries_never_collide() {
        let backend = Arc::new(LocalBackend::new());

        let first = DefinitionRegistry::new(backend.clone(), "role")
            .register(order_processing_definition().unwrap())
            .await
            .unwrap();
        let second = DefinitionRegistry::new(backend.clone(), "role")
            .register(order_processing_definition().unwrap())
            .await
            .unwrap();

        assert_ne!(first.registration_name(), second.registration_name());
        assert_ne!(first.handle(), second.handle());
        assert_eq!(backend.definition_count(), 2);
    }

    #[tokio::test]
    async fn test_verify_detects_dropped_parameter() {
        let mut document = order_processing_definition().unwrap().to_document();
        document
            .states
            .get_mut("ShipOrder")
            .unwrap()
            .parameters
            .remove("trackingNumber");
        let stored = document.to_json().unwrap();

        let mut mock = MockOrchestrationBackend::new();
        mock.expect_register()
            .returning(|_, _, _| Ok(RegisterResponse::with_handle("def-1")));
        mock.expect_describe_definition().times(1).returning(move |_| {
            Ok(DefinitionDescription {
                document: stored.clone(),
                role: "arn:role/exec".to_string(),
            })
        });

        let registry = registry(mock);
        let registered = registry.register(order_processing_definition().unwrap()).await.unwrap();
        let err = registry.verify(&registered).await.unwrap_err();

        assert!(matches!(err, WorkflowError::RegistrationFailed { .. }), "{err}");
        assert!(err.to_string().contains("ShipOrder"), "{err}");
    }

    #[tokio::test]
    async fn test_register_without_handle_fails() {
        for response in [
            RegisterResponse::default(),
            RegisterResponse::with_handle(""),
        ] {
            let mut mock = MockOrchestrationBackend::new();
            mock.expect_register()
                .times(1)
                .returning(move |_, _, _| Ok(response.clone()));

            let err = registry(mock)
                .register(order_processing_definition().unwrap())
                .await
                .unwrap_err();

            assert!(matches!(err, WorkflowError::RegistrationFailed { source: None, .. }));
            assert_eq!(err.phase(), Phase::Registration);
        }
    }

    #[tokio::test]
    async fn test_register_backend_error_fails() {
        let mut mock = MockOrchestrationBackend::new();
        mock.expect_register()
            .times(1)
            .returning(|_, _, _| Err(BackendError::unavailable("register", "connection refused")));
        let sink = Arc::new(CollectingEventSink::new());

        let err = registry(mock)
            .with_event_sink(sink.clone())
            .register(order_processing_definition().unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::RegistrationFailed { source: Some(_), .. }));
        assert_eq!(
            sink.event_types(),
            vec![event_types::DEFINITION_REGISTRATION_FAILED]
        );
    }

    #[tokio::test]
    async fn test_register_submits_document_and_role() {
        let mut mock = MockOrchestrationBackend::new();
        mock.expect_register()
            .withf(|name, document, role| {
                name.starts_with("order-processing-")
                    && document.contains("\"StartAt\":\"ValidateOrder\"")
                    && role.to_string() == "arn:role/exec"
            })
            .times(1)
            .returning(|_, _, _| Ok(RegisterResponse::with_handle("def-1")));

        let registered = registry(mock).register(order_processing_definition().unwrap()).await.unwrap();
        assert_eq!(registered.handle(), "def-1");
    }

    #[tokio::test]
    async fn test_verify_round_trip() {
        let registry = registry(LocalBackend::new());
        let registered = registry.register(order_processing_definition().unwrap()).await.unwrap();

        registry.verify(&registered).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_detects_mismatches() {
        let document = order_processing_definition().unwrap().to_json().unwrap();
        let reordered = document.replace("\"Next\":\"FulfillOrder\"", "\"Next\":\"ShipOrder\"");
        let retagged = document.replace("\"trackingNumber\":\"TRACK123\"", "\"trackingNumber\":\"OTHER\"");
        assert_ne!(retagged, document);

        let cases = [
            ("arn:role/other".to_string(), document.clone(), "execution role"),
            ("arn:role/exec".to_string(), reordered, "ProcessPayment"),
            ("arn:role/exec".to_string(), retagged, "stage 'ShipOrder' parameters differ"),
            ("arn:role/exec".to_string(), "not json".to_string(), "mismatch"),
        ];

        for (role, stored, expected) in cases {
            let mut mock = MockOrchestrationBackend::new();
            mock.expect_register()
                .returning(|_, _, _| Ok(RegisterResponse::with_handle("def-1")));
            mock.expect_describe_definition()
                .times(1)
                .returning(move |_| {
                    Ok(DefinitionDescription {
                        document: stored.clone(),
                        role: role.clone(),
                    })
                });

            let registry = registry(mock);
            let registered = registry.register(order_processing_definition().unwrap()).await.unwrap();
            let err = registry.verify(&registered).await.unwrap_err();

            assert!(err.to_string().contains(expected), "{err}");
        }
    }
}
