//! Worker-side workflow engine.
//!
//! Hosts user-defined workflow functions against a Cadence-style
//! orchestration service: reconstructs workflow state from history,
//! drives the deterministic dispatcher, and produces the decision batch
//! for each decision task. The RPC transport and pollers live outside
//! this crate and hand tasks to [`task_handler::WorkflowTaskHandler`].

pub mod cache;
pub mod environment;
pub mod event_handler;
pub mod options;
pub mod registry;
pub mod replayer;
pub mod task_handler;

pub use cache::{CachedExecution, WorkflowCache, WorkflowExecutionKey};
pub use environment::WorkflowEnv;
pub use event_handler::{ExecutionError, WorkflowEventHandler, QUERY_RESULT_SIZE_LIMIT};
pub use options::{
    ContextPropagator, WorkerOptions, WorkflowInterceptor, WorkflowInterceptorFactory,
};
pub use registry::{RegisterOptions, Registry, RegistryError};
pub use replayer::WorkflowReplayer;
pub use task_handler::{
    DecisionTask, DecisionTaskResult, QueryTaskResult, WorkflowQuery, WorkflowTaskHandler,
};
