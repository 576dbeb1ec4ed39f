//! Lifecycle events.
//!
//! The registry, launcher, and monitor each accept an optional
//! [`EventSink`] and report what they do to it. Without one, events are
//! discarded.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names.
pub mod event_types {
    /// A definition was accepted by the backend.
    pub const DEFINITION_REGISTERED: &str = "definition.registered";
    /// Registration was refused or returned no handle.
    pub const DEFINITION_REGISTRATION_FAILED: &str = "definition.registration_failed";
    /// A stored definition was compared against the local one.
    pub const DEFINITION_VERIFIED: &str = "definition.verified";
    /// An execution was launched.
    pub const EXECUTION_STARTED: &str = "execution.started";
    /// One status observation was made.
    pub const EXECUTION_POLLED: &str = "execution.polled";
    /// The execution finished successfully.
    pub const EXECUTION_SUCCEEDED: &str = "execution.succeeded";
    /// The execution finished in a failure status.
    pub const EXECUTION_FAILED: &str = "execution.failed";
    /// The attempt budget ran out before a terminal status.
    pub const EXECUTION_POLLING_EXHAUSTED: &str = "execution.polling_exhausted";
    /// A stop request was sent after exhaustion.
    pub const EXECUTION_STOP_REQUESTED: &str = "execution.stop_requested";
    /// The stop request itself failed.
    pub const EXECUTION_STOP_FAILED: &str = "execution.stop_failed";
    /// The backend reported success but the output failed its check.
    pub const EXECUTION_POSTCONDITION_VIOLATED: &str = "execution.postcondition_violated";
}
