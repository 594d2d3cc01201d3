//! Worker configuration.

use std::collections::HashMap;
use std::sync::Arc;

use windlass_core::encoded::DataConverter;
use windlass_core::types::{Header, NonDeterministicWorkflowPolicy, WorkflowInfo};
use windlass_core::JsonDataConverter;

/// Carries caller context across workflow boundaries through headers.
/// Propagators run in registration order.
pub trait ContextPropagator: Send + Sync {
    fn name(&self) -> &str;

    /// Contribute fields to an outgoing header.
    fn inject(&self, fields: &mut HashMap<String, Vec<u8>>);

    /// Observe fields from an incoming header.
    fn extract(&self, fields: &HashMap<String, Vec<u8>>);
}

/// Hooks wrapping the workflow primitives. One interceptor instance is
/// created per workflow execution.
pub trait WorkflowInterceptor: Send + Sync {
    fn on_execute_workflow(&self, _info: &WorkflowInfo) {}
    fn on_execute_activity(&self, _activity_type: &str) {}
    fn on_execute_child_workflow(&self, _workflow_type: &str) {}
}

/// Factory producing a [`WorkflowInterceptor`] chain entry for each
/// execution.
pub trait WorkflowInterceptorFactory: Send + Sync {
    fn new_interceptor(&self, info: &WorkflowInfo) -> Arc<dyn WorkflowInterceptor>;
}

/// Options recognized by the workflow execution core.
#[derive(Clone)]
pub struct WorkerOptions {
    /// Disable the in-memory workflow cache; every task replays from the
    /// start of history.
    pub disable_sticky_execution: bool,
    /// What to do when workflow code panics or diverges from history.
    pub non_deterministic_workflow_policy: NonDeterministicWorkflowPolicy,
    /// Worker identity reported to the service.
    pub identity: String,
    /// Emit workflow-scoped logs during replay as well.
    pub enable_logging_in_replay: bool,
    /// Payload serializer.
    pub data_converter: Arc<dyn DataConverter>,
    /// Header-carried context enrichers, applied in order.
    pub context_propagators: Vec<Arc<dyn ContextPropagator>>,
    /// Interceptor chain factories.
    pub workflow_interceptor_factories: Vec<Arc<dyn WorkflowInterceptorFactory>>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            disable_sticky_execution: false,
            non_deterministic_workflow_policy: NonDeterministicWorkflowPolicy::BlockWorkflow,
            identity: format!(
                "windlass-worker@{}-pid-{}",
                std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
                std::process::id()
            ),
            enable_logging_in_replay: false,
            data_converter: Arc::new(JsonDataConverter::new()),
            context_propagators: Vec::new(),
            workflow_interceptor_factories: Vec::new(),
        }
    }
}

impl std::fmt::Debug for WorkerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerOptions")
            .field("disable_sticky_execution", &self.disable_sticky_execution)
            .field(
                "non_deterministic_workflow_policy",
                &self.non_deterministic_workflow_policy,
            )
            .field("identity", &self.identity)
            .field("enable_logging_in_replay", &self.enable_logging_in_replay)
            .finish()
    }
}

impl WorkerOptions {
    /// Run every propagator's extract over an incoming header.
    pub(crate) fn extract_header(&self, header: &Header) {
        for propagator in &self.context_propagators {
            propagator.extract(&header.fields);
        }
    }
}
