//! Error taxonomy for workflow and activity execution.
//!
//! Every user-visible failure mode has its own type so workflow code can
//! match on what actually happened: application errors keep their reason
//! and details payload, timeouts keep their kind, cancellation and
//! termination are distinct from failure.

use std::fmt;
use thiserror::Error;

use crate::types::{ContinueAsNewOptions, Version};

/// Application-defined error with an opaque reason string and a structured
/// details payload produced by the data converter.
#[derive(Debug, Clone, Error)]
#[error("CustomError: reason={reason}")]
pub struct CustomError {
    pub reason: String,
    pub details: Vec<u8>,
}

impl CustomError {
    pub fn new(reason: impl Into<String>, details: Vec<u8>) -> Self {
        Self {
            reason: reason.into(),
            details,
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn details(&self) -> &[u8] {
        &self.details
    }
}

/// An operation (activity, timer, child workflow, or the workflow itself)
/// was canceled.
#[derive(Debug, Clone, Default, Error)]
#[error("CanceledError")]
pub struct CanceledError {
    pub details: Vec<u8>,
}

impl CanceledError {
    pub fn new(details: Vec<u8>) -> Self {
        Self { details }
    }
}

/// Which timeout fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TimeoutType {
    StartToClose,
    ScheduleToStart,
    ScheduleToClose,
    Heartbeat,
}

impl fmt::Display for TimeoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutType::StartToClose => write!(f, "START_TO_CLOSE"),
            TimeoutType::ScheduleToStart => write!(f, "SCHEDULE_TO_START"),
            TimeoutType::ScheduleToClose => write!(f, "SCHEDULE_TO_CLOSE"),
            TimeoutType::Heartbeat => write!(f, "HEARTBEAT"),
        }
    }
}

/// An operation timed out. Heartbeat timeouts carry the details from the
/// last recorded heartbeat.
#[derive(Debug, Clone, Error)]
#[error("TimeoutError: timeout_type={timeout_type}")]
pub struct TimeoutError {
    pub timeout_type: TimeoutType,
    pub details: Vec<u8>,
    pub last_heartbeat_details: Vec<u8>,
}

impl TimeoutError {
    pub fn new(timeout_type: TimeoutType, details: Vec<u8>) -> Self {
        Self {
            timeout_type,
            details,
            last_heartbeat_details: Vec::new(),
        }
    }

    pub fn with_heartbeat_details(mut self, details: Vec<u8>) -> Self {
        self.last_heartbeat_details = details;
        self
    }

    pub fn timeout_type(&self) -> TimeoutType {
        self.timeout_type
    }
}

/// The workflow was terminated externally. Carries no details.
#[derive(Debug, Clone, Default, Error)]
#[error("TerminatedError")]
pub struct TerminatedError;

/// String-only fallback for legacy or unclassified errors.
#[derive(Debug, Clone, Error)]
#[error("GenericError: {message}")]
pub struct GenericError {
    pub message: String,
}

impl GenericError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A panic captured from user code, with its stack trace.
#[derive(Debug, Clone, Error)]
#[error("PanicError: {message}")]
pub struct PanicError {
    pub message: String,
    pub stack_trace: String,
}

impl PanicError {
    pub fn new(message: impl Into<String>, stack_trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: stack_trace.into(),
        }
    }
}

/// Why replay diverged from recorded history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NonDeterminismReason {
    /// Workflow code produced a decision with no matching history event.
    #[error("missing history event for local decision")]
    MissingHistoryEvent,
    /// History contains an event with no matching local state machine.
    #[error("missing local decision for history event")]
    MissingLocalDecision,
    /// A replayed value disagrees with the recorded one.
    #[error("replay mismatch")]
    Mismatch,
}

/// Replay of workflow code diverged from the recorded history.
#[derive(Debug, Clone, Error)]
#[error("NonDeterministicError: reason={reason}, workflow_type={workflow_type}, run_id={run_id}")]
pub struct NonDeterministicError {
    pub reason: NonDeterminismReason,
    pub workflow_type: String,
    pub workflow_id: String,
    pub run_id: String,
    pub details: Option<String>,
}

/// Not a failure: a control signal asking the service to atomically close
/// this run and start a fresh one with the same workflow id.
#[derive(Debug, Clone, Error)]
#[error("ContinueAsNewError: workflow_type={workflow_type}")]
pub struct ContinueAsNewError {
    pub workflow_type: String,
    pub input: Vec<u8>,
    pub options: ContinueAsNewOptions,
}

impl ContinueAsNewError {
    pub fn new(
        workflow_type: impl Into<String>,
        input: Vec<u8>,
        options: ContinueAsNewOptions,
    ) -> Self {
        Self {
            workflow_type: workflow_type.into(),
            input,
            options,
        }
    }
}

/// Starting a child workflow failed because an execution with the same
/// workflow id is already running.
#[derive(Debug, Clone, Error)]
#[error("WorkflowExecutionAlreadyStartedError: {message}")]
pub struct WorkflowExecutionAlreadyStartedError {
    pub message: String,
}

impl WorkflowExecutionAlreadyStartedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A signal or cancel targeted a workflow execution the service does not
/// know about.
#[derive(Debug, Clone, Default, Error)]
#[error("UnknownExternalWorkflowExecutionError")]
pub struct UnknownExternalWorkflowExecutionError;

/// A recorded `Version` marker lies outside the range the current code
/// supports.
#[derive(Debug, Clone, Error)]
#[error(
    "unsupported version {version} for change id \"{change_id}\", \
     supported range is [{min_supported}, {max_supported}]"
)]
pub struct UnsupportedVersionError {
    pub change_id: String,
    pub version: Version,
    pub min_supported: Version,
    pub max_supported: Version,
}

/// The error type delivered through workflow futures and returned by
/// engine operations.
#[derive(Debug, Clone, Error)]
pub enum WindlassError {
    #[error(transparent)]
    Custom(#[from] CustomError),

    #[error(transparent)]
    Canceled(#[from] CanceledError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error(transparent)]
    Terminated(#[from] TerminatedError),

    #[error(transparent)]
    Generic(#[from] GenericError),

    #[error(transparent)]
    Panic(#[from] PanicError),

    #[error(transparent)]
    ContinueAsNew(#[from] ContinueAsNewError),

    #[error(transparent)]
    NonDeterministic(#[from] NonDeterministicError),

    #[error(transparent)]
    WorkflowAlreadyStarted(#[from] WorkflowExecutionAlreadyStartedError),

    #[error(transparent)]
    UnknownExternalWorkflowExecution(#[from] UnknownExternalWorkflowExecutionError),

    #[error("QueryFailed: {0}")]
    QueryFailed(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} is not registered")]
    NotRegistered(String),
}

pub type WindlassResult<T> = Result<T, WindlassError>;

impl WindlassError {
    /// Reconstruct a typed error from the `(reason, details)` pair carried
    /// by failure history events. The canonical reason strings mirror what
    /// the worker writes when it reports the failure.
    pub fn from_reason(reason: &str, details: Vec<u8>) -> Self {
        match reason {
            "cadenceInternal:Terminated" => TerminatedError.into(),
            "cadenceInternal:Canceled" => CanceledError::new(details).into(),
            "cadenceInternal:Generic" => {
                GenericError::new(String::from_utf8_lossy(&details).into_owned()).into()
            }
            _ => CustomError::new(reason, details).into(),
        }
    }

    /// The `(reason, details)` pair to report for this error in a failure
    /// decision or marker. Inverse of [`WindlassError::from_reason`].
    pub fn reason_and_details(&self) -> (String, Vec<u8>) {
        match self {
            WindlassError::Custom(e) => (e.reason.clone(), e.details.clone()),
            WindlassError::Canceled(e) => ("cadenceInternal:Canceled".into(), e.details.clone()),
            WindlassError::Terminated(_) => ("cadenceInternal:Terminated".into(), Vec::new()),
            WindlassError::Generic(e) => {
                ("cadenceInternal:Generic".into(), e.message.clone().into_bytes())
            }
            other => ("cadenceInternal:Generic".into(), other.to_string().into_bytes()),
        }
    }
}

pub fn is_canceled_error(err: &WindlassError) -> bool {
    matches!(err, WindlassError::Canceled(_))
}

pub fn is_custom_error(err: &WindlassError) -> bool {
    matches!(err, WindlassError::Custom(_))
}

pub fn is_timeout_error(err: &WindlassError) -> bool {
    matches!(err, WindlassError::Timeout(_))
}

pub fn is_terminated_error(err: &WindlassError) -> bool {
    matches!(err, WindlassError::Terminated(_))
}

pub fn is_continue_as_new_error(err: &WindlassError) -> bool {
    matches!(err, WindlassError::ContinueAsNew(_))
}

pub fn is_panic_error(err: &WindlassError) -> bool {
    matches!(err, WindlassError::Panic(_))
}

pub fn is_non_deterministic_error(err: &WindlassError) -> bool {
    matches!(err, WindlassError::NonDeterministic(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_error_round_trips_through_reason() {
        let err = WindlassError::from(CustomError::new("failing-on-purpose", b"details".to_vec()));
        let (reason, details) = err.reason_and_details();
        assert_eq!(reason, "failing-on-purpose");

        let back = WindlassError::from_reason(&reason, details);
        match back {
            WindlassError::Custom(c) => {
                assert_eq!(c.reason(), "failing-on-purpose");
                assert_eq!(c.details(), b"details");
            }
            other => panic!("expected CustomError, got {other:?}"),
        }
    }

    #[test]
    fn internal_reasons_map_to_typed_errors() {
        assert!(is_terminated_error(&WindlassError::from_reason(
            "cadenceInternal:Terminated",
            vec![]
        )));
        assert!(is_canceled_error(&WindlassError::from_reason(
            "cadenceInternal:Canceled",
            vec![]
        )));
        match WindlassError::from_reason("cadenceInternal:Generic", b"boom".to_vec()) {
            WindlassError::Generic(g) => assert_eq!(g.message, "boom"),
            other => panic!("expected GenericError, got {other:?}"),
        }
    }

    #[test]
    fn timeout_kinds_render_wire_names() {
        assert_eq!(TimeoutType::Heartbeat.to_string(), "HEARTBEAT");
        assert_eq!(TimeoutType::ScheduleToStart.to_string(), "SCHEDULE_TO_START");
    }

    #[test]
    fn predicates_match_variants() {
        let timeout: WindlassError =
            TimeoutError::new(TimeoutType::StartToClose, Vec::new()).into();
        assert!(is_timeout_error(&timeout));
        assert!(!is_canceled_error(&timeout));
    }
}
