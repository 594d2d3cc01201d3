//! Deterministic workflow execution primitives.
//!
//! This crate contains the pieces a workflow executes on top of: the
//! cooperative dispatcher and its channels, selectors, and cancellation
//! scopes; the decision state machines mirroring every workflow-issued
//! intent; and the [`context::WorkflowContext`] API surface user code
//! programs against, routed through the [`context::WorkflowEnvironment`]
//! seam the worker implements.

pub mod cancel;
pub mod channel;
pub mod context;
pub mod dispatcher;
pub mod future;
pub mod local_activity;
pub mod markers;
pub mod selector;
pub mod state_machine;

pub use cancel::CancellationScope;
pub use channel::{channel, unbounded_channel, Receiver, Sender};
pub use context::{
    ExecuteActivityParams, ExecuteChildWorkflowParams, SharedEnvironment, WorkflowContext,
    WorkflowEnvironment,
};
pub use dispatcher::{Dispatcher, SpawnHandle};
pub use future::{completable, Completer, ResultHandler, WorkflowFuture};
pub use selector::Selector;
pub use state_machine::{
    DecisionId, DecisionKind, DecisionState, DecisionsHelper, StateMachinePanic,
    LOCAL_ACTIVITY_MARKER_NAME, MUTABLE_SIDE_EFFECT_MARKER_NAME, SIDE_EFFECT_MARKER_NAME,
    VERSION_MARKER_NAME,
};
