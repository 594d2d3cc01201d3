//! Internal value model for workflow history events.
//!
//! The transport layer translates whatever wire representation it speaks
//! into these types at the boundary, so the execution engine never touches
//! generated protocol stubs. Event kind is carried by the attributes enum,
//! which is also the dispatch key for the replay driver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimeoutType;
use crate::types::{
    ActivityType, Header, Memo, ParentClosePolicy, RetryPolicy, SearchAttributes, TaskList,
    WorkflowExecution, WorkflowIdReusePolicy, WorkflowType,
};

/// An append-only record of one workflow state transition, as stored by
/// the service. Event ids are strictly increasing within an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_id: i64,
    pub timestamp: DateTime<Utc>,
    pub attributes: EventAttributes,
}

impl HistoryEvent {
    pub fn new(event_id: i64, timestamp: DateTime<Utc>, attributes: EventAttributes) -> Self {
        Self {
            event_id,
            timestamp,
            attributes,
        }
    }

    pub fn is_decision_task_started(&self) -> bool {
        matches!(self.attributes, EventAttributes::DecisionTaskStarted(_))
    }

    /// Short name of the event kind, for logging.
    pub fn type_name(&self) -> &'static str {
        self.attributes.type_name()
    }
}

/// History of a workflow execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub events: Vec<HistoryEvent>,
}

/// Payload of a history event. One variant per event kind the service can
/// record; [`EventAttributes::Unknown`] absorbs kinds introduced after
/// this worker was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventAttributes {
    WorkflowExecutionStarted(Box<WorkflowExecutionStartedEventAttributes>),
    WorkflowExecutionCompleted(Box<WorkflowExecutionCompletedEventAttributes>),
    WorkflowExecutionFailed(Box<WorkflowExecutionFailedEventAttributes>),
    WorkflowExecutionTimedOut(Box<WorkflowExecutionTimedOutEventAttributes>),
    WorkflowExecutionCanceled(Box<WorkflowExecutionCanceledEventAttributes>),
    WorkflowExecutionTerminated(Box<WorkflowExecutionTerminatedEventAttributes>),
    WorkflowExecutionContinuedAsNew(Box<WorkflowExecutionContinuedAsNewEventAttributes>),
    DecisionTaskScheduled(Box<DecisionTaskScheduledEventAttributes>),
    DecisionTaskStarted(Box<DecisionTaskStartedEventAttributes>),
    DecisionTaskCompleted(Box<DecisionTaskCompletedEventAttributes>),
    DecisionTaskTimedOut(Box<DecisionTaskTimedOutEventAttributes>),
    DecisionTaskFailed(Box<DecisionTaskFailedEventAttributes>),
    ActivityTaskScheduled(Box<ActivityTaskScheduledEventAttributes>),
    ActivityTaskStarted(Box<ActivityTaskStartedEventAttributes>),
    ActivityTaskCompleted(Box<ActivityTaskCompletedEventAttributes>),
    ActivityTaskFailed(Box<ActivityTaskFailedEventAttributes>),
    ActivityTaskTimedOut(Box<ActivityTaskTimedOutEventAttributes>),
    ActivityTaskCancelRequested(Box<ActivityTaskCancelRequestedEventAttributes>),
    RequestCancelActivityTaskFailed(Box<RequestCancelActivityTaskFailedEventAttributes>),
    ActivityTaskCanceled(Box<ActivityTaskCanceledEventAttributes>),
    TimerStarted(Box<TimerStartedEventAttributes>),
    TimerFired(Box<TimerFiredEventAttributes>),
    TimerCanceled(Box<TimerCanceledEventAttributes>),
    CancelTimerFailed(Box<CancelTimerFailedEventAttributes>),
    WorkflowExecutionCancelRequested(Box<WorkflowExecutionCancelRequestedEventAttributes>),
    WorkflowExecutionSignaled(Box<WorkflowExecutionSignaledEventAttributes>),
    MarkerRecorded(Box<MarkerRecordedEventAttributes>),
    UpsertWorkflowSearchAttributes(Box<UpsertWorkflowSearchAttributesEventAttributes>),
    RequestCancelExternalWorkflowExecutionInitiated(
        Box<RequestCancelExternalWorkflowExecutionInitiatedEventAttributes>,
    ),
    RequestCancelExternalWorkflowExecutionFailed(
        Box<RequestCancelExternalWorkflowExecutionFailedEventAttributes>,
    ),
    ExternalWorkflowExecutionCancelRequested(
        Box<ExternalWorkflowExecutionCancelRequestedEventAttributes>,
    ),
    SignalExternalWorkflowExecutionInitiated(
        Box<SignalExternalWorkflowExecutionInitiatedEventAttributes>,
    ),
    SignalExternalWorkflowExecutionFailed(
        Box<SignalExternalWorkflowExecutionFailedEventAttributes>,
    ),
    ExternalWorkflowExecutionSignaled(Box<ExternalWorkflowExecutionSignaledEventAttributes>),
    StartChildWorkflowExecutionInitiated(Box<StartChildWorkflowExecutionInitiatedEventAttributes>),
    StartChildWorkflowExecutionFailed(Box<StartChildWorkflowExecutionFailedEventAttributes>),
    ChildWorkflowExecutionStarted(Box<ChildWorkflowExecutionStartedEventAttributes>),
    ChildWorkflowExecutionCompleted(Box<ChildWorkflowExecutionCompletedEventAttributes>),
    ChildWorkflowExecutionFailed(Box<ChildWorkflowExecutionFailedEventAttributes>),
    ChildWorkflowExecutionCanceled(Box<ChildWorkflowExecutionCanceledEventAttributes>),
    ChildWorkflowExecutionTimedOut(Box<ChildWorkflowExecutionTimedOutEventAttributes>),
    ChildWorkflowExecutionTerminated(Box<ChildWorkflowExecutionTerminatedEventAttributes>),
    /// Event kind this worker does not understand. Logged and ignored for
    /// forward compatibility.
    Unknown { kind: String },
}

impl EventAttributes {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventAttributes::WorkflowExecutionStarted(_) => "WorkflowExecutionStarted",
            EventAttributes::WorkflowExecutionCompleted(_) => "WorkflowExecutionCompleted",
            EventAttributes::WorkflowExecutionFailed(_) => "WorkflowExecutionFailed",
            EventAttributes::WorkflowExecutionTimedOut(_) => "WorkflowExecutionTimedOut",
            EventAttributes::WorkflowExecutionCanceled(_) => "WorkflowExecutionCanceled",
            EventAttributes::WorkflowExecutionTerminated(_) => "WorkflowExecutionTerminated",
            EventAttributes::WorkflowExecutionContinuedAsNew(_) => {
                "WorkflowExecutionContinuedAsNew"
            }
            EventAttributes::DecisionTaskScheduled(_) => "DecisionTaskScheduled",
            EventAttributes::DecisionTaskStarted(_) => "DecisionTaskStarted",
            EventAttributes::DecisionTaskCompleted(_) => "DecisionTaskCompleted",
            EventAttributes::DecisionTaskTimedOut(_) => "DecisionTaskTimedOut",
            EventAttributes::DecisionTaskFailed(_) => "DecisionTaskFailed",
            EventAttributes::ActivityTaskScheduled(_) => "ActivityTaskScheduled",
            EventAttributes::ActivityTaskStarted(_) => "ActivityTaskStarted",
            EventAttributes::ActivityTaskCompleted(_) => "ActivityTaskCompleted",
            EventAttributes::ActivityTaskFailed(_) => "ActivityTaskFailed",
            EventAttributes::ActivityTaskTimedOut(_) => "ActivityTaskTimedOut",
            EventAttributes::ActivityTaskCancelRequested(_) => "ActivityTaskCancelRequested",
            EventAttributes::RequestCancelActivityTaskFailed(_) => {
                "RequestCancelActivityTaskFailed"
            }
            EventAttributes::ActivityTaskCanceled(_) => "ActivityTaskCanceled",
            EventAttributes::TimerStarted(_) => "TimerStarted",
            EventAttributes::TimerFired(_) => "TimerFired",
            EventAttributes::TimerCanceled(_) => "TimerCanceled",
            EventAttributes::CancelTimerFailed(_) => "CancelTimerFailed",
            EventAttributes::WorkflowExecutionCancelRequested(_) => {
                "WorkflowExecutionCancelRequested"
            }
            EventAttributes::WorkflowExecutionSignaled(_) => "WorkflowExecutionSignaled",
            EventAttributes::MarkerRecorded(_) => "MarkerRecorded",
            EventAttributes::UpsertWorkflowSearchAttributes(_) => {
                "UpsertWorkflowSearchAttributes"
            }
            EventAttributes::RequestCancelExternalWorkflowExecutionInitiated(_) => {
                "RequestCancelExternalWorkflowExecutionInitiated"
            }
            EventAttributes::RequestCancelExternalWorkflowExecutionFailed(_) => {
                "RequestCancelExternalWorkflowExecutionFailed"
            }
            EventAttributes::ExternalWorkflowExecutionCancelRequested(_) => {
                "ExternalWorkflowExecutionCancelRequested"
            }
            EventAttributes::SignalExternalWorkflowExecutionInitiated(_) => {
                "SignalExternalWorkflowExecutionInitiated"
            }
            EventAttributes::SignalExternalWorkflowExecutionFailed(_) => {
                "SignalExternalWorkflowExecutionFailed"
            }
            EventAttributes::ExternalWorkflowExecutionSignaled(_) => {
                "ExternalWorkflowExecutionSignaled"
            }
            EventAttributes::StartChildWorkflowExecutionInitiated(_) => {
                "StartChildWorkflowExecutionInitiated"
            }
            EventAttributes::StartChildWorkflowExecutionFailed(_) => {
                "StartChildWorkflowExecutionFailed"
            }
            EventAttributes::ChildWorkflowExecutionStarted(_) => "ChildWorkflowExecutionStarted",
            EventAttributes::ChildWorkflowExecutionCompleted(_) => {
                "ChildWorkflowExecutionCompleted"
            }
            EventAttributes::ChildWorkflowExecutionFailed(_) => "ChildWorkflowExecutionFailed",
            EventAttributes::ChildWorkflowExecutionCanceled(_) => "ChildWorkflowExecutionCanceled",
            EventAttributes::ChildWorkflowExecutionTimedOut(_) => "ChildWorkflowExecutionTimedOut",
            EventAttributes::ChildWorkflowExecutionTerminated(_) => {
                "ChildWorkflowExecutionTerminated"
            }
            EventAttributes::Unknown { .. } => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionStartedEventAttributes {
    pub workflow_type: WorkflowType,
    pub parent_workflow_execution: Option<WorkflowExecution>,
    pub task_list: TaskList,
    pub input: Vec<u8>,
    pub execution_start_to_close_timeout_seconds: i32,
    pub task_start_to_close_timeout_seconds: i32,
    pub continued_execution_run_id: Option<String>,
    pub attempt: i32,
    pub cron_schedule: Option<String>,
    pub memo: Option<Memo>,
    pub search_attributes: Option<SearchAttributes>,
    pub header: Option<Header>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionCompletedEventAttributes {
    pub result: Option<Vec<u8>>,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionFailedEventAttributes {
    pub reason: Option<String>,
    pub details: Option<Vec<u8>>,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionTimedOutEventAttributes {
    pub timeout_type: TimeoutType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionCanceledEventAttributes {
    pub details: Option<Vec<u8>>,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionTerminatedEventAttributes {
    pub reason: Option<String>,
    pub details: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionContinuedAsNewEventAttributes {
    pub new_execution_run_id: String,
    pub workflow_type: WorkflowType,
    pub task_list: TaskList,
    pub input: Vec<u8>,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTaskScheduledEventAttributes {
    pub task_list: TaskList,
    pub start_to_close_timeout_seconds: i32,
    pub attempt: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTaskStartedEventAttributes {
    pub scheduled_event_id: i64,
    pub identity: String,
    pub request_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTaskCompletedEventAttributes {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub identity: String,
    pub binary_checksum: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTaskTimedOutEventAttributes {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTaskFailedEventAttributes {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskScheduledEventAttributes {
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub schedule_to_close_timeout_seconds: Option<i32>,
    pub schedule_to_start_timeout_seconds: Option<i32>,
    pub start_to_close_timeout_seconds: Option<i32>,
    pub heartbeat_timeout_seconds: Option<i32>,
    pub decision_task_completed_event_id: i64,
    pub retry_policy: Option<RetryPolicy>,
    pub header: Option<Header>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskStartedEventAttributes {
    pub scheduled_event_id: i64,
    pub identity: String,
    pub attempt: i32,
    pub last_failure_reason: Option<String>,
    pub last_failure_details: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskCompletedEventAttributes {
    pub result: Option<Vec<u8>>,
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskFailedEventAttributes {
    pub reason: Option<String>,
    pub details: Option<Vec<u8>>,
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskTimedOutEventAttributes {
    pub details: Option<Vec<u8>>,
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub timeout_type: TimeoutType,
    /// Failure recorded on the last retry attempt, if any. Start-to-close
    /// timeouts after retries report this instead of the timeout itself to
    /// keep the error type stable across attempts.
    pub last_failure_reason: Option<String>,
    pub last_failure_details: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskCancelRequestedEventAttributes {
    pub activity_id: String,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelActivityTaskFailedEventAttributes {
    pub activity_id: String,
    pub cause: String,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskCanceledEventAttributes {
    pub details: Option<Vec<u8>>,
    pub latest_cancel_requested_event_id: i64,
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerStartedEventAttributes {
    pub timer_id: String,
    pub start_to_fire_timeout_seconds: i64,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerFiredEventAttributes {
    pub timer_id: String,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerCanceledEventAttributes {
    pub timer_id: String,
    pub started_event_id: i64,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelTimerFailedEventAttributes {
    pub timer_id: String,
    pub cause: String,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionCancelRequestedEventAttributes {
    pub cause: Option<String>,
    pub external_workflow_execution: Option<WorkflowExecution>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionSignaledEventAttributes {
    pub signal_name: String,
    pub input: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecordedEventAttributes {
    pub marker_name: String,
    pub details: Option<Vec<u8>>,
    pub decision_task_completed_event_id: i64,
    pub header: Option<Header>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertWorkflowSearchAttributesEventAttributes {
    pub decision_task_completed_event_id: i64,
    pub search_attributes: SearchAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelExternalWorkflowExecutionInitiatedEventAttributes {
    pub decision_task_completed_event_id: i64,
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    /// Client-generated cancellation id. Empty when the request targets a
    /// child workflow, which is tracked through its own state machine.
    pub control: Option<String>,
    pub child_workflow_only: bool,
}

/// Why a request to cancel an external workflow failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelExternalWorkflowExecutionFailedCause {
    #[default]
    UnknownExternalWorkflowExecution,
    WorkflowAlreadyCompleted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelExternalWorkflowExecutionFailedEventAttributes {
    pub cause: CancelExternalWorkflowExecutionFailedCause,
    pub decision_task_completed_event_id: i64,
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub initiated_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalWorkflowExecutionCancelRequestedEventAttributes {
    pub initiated_event_id: i64,
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalExternalWorkflowExecutionInitiatedEventAttributes {
    pub decision_task_completed_event_id: i64,
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub signal_name: String,
    pub input: Option<Vec<u8>>,
    /// Client-generated signal id.
    pub control: Option<String>,
    pub child_workflow_only: bool,
}

/// Why signaling an external workflow failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalExternalWorkflowExecutionFailedCause {
    #[default]
    UnknownExternalWorkflowExecution,
    WorkflowAlreadyCompleted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalExternalWorkflowExecutionFailedEventAttributes {
    pub cause: SignalExternalWorkflowExecutionFailedCause,
    pub decision_task_completed_event_id: i64,
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub initiated_event_id: i64,
    pub control: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalWorkflowExecutionSignaledEventAttributes {
    pub initiated_event_id: i64,
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub control: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartChildWorkflowExecutionInitiatedEventAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub execution_start_to_close_timeout_seconds: Option<i32>,
    pub task_start_to_close_timeout_seconds: Option<i32>,
    pub parent_close_policy: ParentClosePolicy,
    pub workflow_id_reuse_policy: WorkflowIdReusePolicy,
    pub decision_task_completed_event_id: i64,
    pub retry_policy: Option<RetryPolicy>,
    pub cron_schedule: Option<String>,
}

/// Why starting a child workflow failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildWorkflowExecutionFailedCause {
    #[default]
    WorkflowAlreadyRunning,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartChildWorkflowExecutionFailedEventAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub cause: ChildWorkflowExecutionFailedCause,
    pub initiated_event_id: i64,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionStartedEventAttributes {
    pub domain: String,
    pub initiated_event_id: i64,
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionCompletedEventAttributes {
    pub result: Option<Vec<u8>>,
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionFailedEventAttributes {
    pub reason: Option<String>,
    pub details: Option<Vec<u8>>,
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionCanceledEventAttributes {
    pub details: Option<Vec<u8>>,
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionTimedOutEventAttributes {
    pub timeout_type: TimeoutType,
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionTerminatedEventAttributes {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub initiated_event_id: i64,
    pub started_event_id: i64,
}
