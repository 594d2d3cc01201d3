//! Core types for the windlass workflow engine.
//!
//! This crate holds everything the workflow and worker crates share: the
//! value types describing executions and options, the error taxonomy, the
//! pluggable data converter, the internal history-event and decision models,
//! and process-wide configuration.

pub mod decision;
pub mod encoded;
pub mod error;
pub mod history;
pub mod process;
pub mod types;

pub use decision::{Decision, DecisionType};
pub use encoded::{decode, encode, DataConverter, EncodedValue, EncodingError, JsonDataConverter};
pub use error::{
    CanceledError, ContinueAsNewError, CustomError, GenericError, NonDeterminismReason,
    NonDeterministicError, PanicError, TerminatedError, TimeoutError, TimeoutType,
    UnknownExternalWorkflowExecutionError, WindlassError, WindlassResult,
    WorkflowExecutionAlreadyStartedError,
};
pub use history::{EventAttributes, History, HistoryEvent};
pub use types::{
    ActivityOptions, ActivityType, ChildWorkflowOptions, ContinueAsNewOptions, Header,
    LocalActivityOptions, Memo, NonDeterministicWorkflowPolicy, ParentClosePolicy, RetryPolicy,
    SearchAttributes, SessionInfo, TaskList, TaskListKind, Version, WorkflowExecution,
    WorkflowIdReusePolicy, WorkflowInfo, WorkflowType, CHANGE_VERSION_SEARCH_ATTRIBUTE,
    DEFAULT_VERSION, QUERY_TYPE_OPEN_SESSIONS, QUERY_TYPE_STACK_TRACE,
};
